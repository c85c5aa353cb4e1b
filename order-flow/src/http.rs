//! Plain reqwest transport, used before the users start (login, store prefetch).
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::Settings,
    error::{DynError, FlowError, SetupError},
    flow::{fetch_stores, FlowContext, Listed},
    metrics::Metrics,
    model::{approved_stores, decode_item, Store},
    transport::{ApiRequest, Exchange, Method, Session, Transport},
};

/// Transport backed by a reqwest Client
pub struct HttpTransport {
    client: Client,
    base_url: String,
    session: Option<Session>,
}

impl HttpTransport {
    /// transport without credentials
    pub fn new(base_url: &str) -> Self {
        HttpTransport {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }
    /// from now on, every request carries the token
    pub fn authenticate(&mut self, session: Session) {
        self.session = Some(session);
    }
    /// current session, if logged in
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&mut self, request: ApiRequest) -> Result<Exchange, DynError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if let Some(session) = &self.session {
            builder = builder.bearer_auth(&session.access_token);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header("Content-Type", "application/json")
                .body(serde_json::to_string(body)?);
        }

        let started = Instant::now();
        let exchange = match builder.send().await {
            Ok(res) => {
                let status = res.status().as_u16();
                Exchange::read(status, res.text().await, 0)
            }
            // no response is reported as status 0
            Err(e) => Exchange {
                status: 0,
                body: e.to_string(),
                elapsed_ms: 0,
            },
        };
        Ok(Exchange {
            elapsed_ms: started.elapsed().as_millis() as u64,
            ..exchange
        })
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tokens {
    access_token: Option<String>,
}

/// log in with the configured customer. The token may come bare or under `result`
pub async fn login<T: Transport>(
    api: &mut T,
    settings: &Settings,
) -> Result<Session, SetupError> {
    let credentials = Credentials {
        username: &settings.username,
        password: &settings.password,
    };
    let name = "POST /auth/login";
    let res = api
        .send(
            ApiRequest::post(settings.endpoints.login.clone(), name, &credentials)
                .map_err(FlowError::from)?,
        )
        .await
        .map_err(FlowError::from)?;
    if res.status != 200 && res.status != 201 {
        return Err(SetupError::LoginFailed {
            status: res.status,
            body: res.body_excerpt().to_string(),
        });
    }
    let tokens: Tokens = decode_item(name, &res.body)?;
    match tokens.access_token {
        Some(access_token) if !access_token.is_empty() => Ok(Session { access_token }),
        _ => Err(SetupError::MissingToken),
    }
}

/// what the setup phase hands over to every user
#[derive(Debug, Clone)]
pub struct SetupData {
    /// customer session
    pub session: Session,
    /// approved stores, possibly empty
    pub stores: Vec<Store>,
}

/// log in, then load the approved stores once for the whole run
pub async fn setup(settings: &Settings, metrics: &Metrics) -> Result<SetupData, SetupError> {
    let mut api = HttpTransport::new(&settings.base_url);
    let session = login(&mut api, settings).await?;
    api.authenticate(session.clone());
    let stores = prefetch_stores(&mut api, settings, metrics).await?;
    Ok(SetupData { session, stores })
}

/// first page of stores, approved only. A failing listing is fatal here.
///
/// Runs before the goose logger exists: nothing is logged, the caller reports the outcome.
pub async fn prefetch_stores<T: Transport>(
    api: &mut T,
    settings: &Settings,
    metrics: &Metrics,
) -> Result<Vec<Store>, SetupError> {
    let ctx = FlowContext {
        endpoints: &settings.endpoints,
        metrics,
        think_time: settings.think_time,
        store_page_size: settings.store_page_size,
        note: "",
    };
    let page = settings.store_page_size;
    match fetch_stores(api, &ctx, 0, page).await? {
        Listed::Items(stores) => Ok(approved_stores(stores)),
        Listed::Status(status) => Err(SetupError::StoreFetch(status)),
    }
}
