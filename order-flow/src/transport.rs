//! The Transport abstraction: how a flow sends requests to the ordering api.
//!
//! The flows never know who is sending: during the load it is a goose user,
//! during setup it is a plain reqwest client, in tests it is a scripted fake.
use std::fmt::Display;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DynError;

/// Bearer token obtained by the login call
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// the raw token, without the `Bearer` prefix
    pub access_token: String,
}

/// http verbs used by the flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST, with a json body
    Post,
}

/// A request as a flow describes it
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// verb
    pub method: Method,
    /// path relative to the host, query included
    pub path: String,
    /// name under which the request is reported
    pub name: &'static str,
    /// json body, only for POST
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// GET request
    pub fn get(path: impl Into<String>, name: &'static str) -> Self {
        ApiRequest {
            method: Method::Get,
            path: path.into(),
            name,
            body: None,
        }
    }
    /// POST request with a json body
    pub fn post<B: Serialize>(
        path: impl Into<String>,
        name: &'static str,
        body: &B,
    ) -> Result<Self, DynError> {
        Ok(ApiRequest {
            method: Method::Post,
            path: path.into(),
            name,
            body: Some(serde_json::to_value(body)?),
        })
    }
}

/// What came back. A request that got no response at all has status 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// http status, 0 if no response
    pub status: u16,
    /// raw body (or the transport error message when status is 0)
    pub body: String,
    /// how long it took, in milliseconds
    pub elapsed_ms: u64,
}

impl Exchange {
    /// answer with `status`, unless its body could not be read: that counts as no response
    pub fn read<E: std::fmt::Display>(status: u16, body: Result<String, E>, elapsed_ms: u64) -> Self {
        match body {
            Ok(body) => Exchange {
                status,
                body,
                elapsed_ms,
            },
            Err(e) => Exchange {
                status: 0,
                body: e.to_string(),
                elapsed_ms,
            },
        }
    }
    /// first 300 chars of the body, for log lines
    pub fn body_excerpt(&self) -> &str {
        match self.body.char_indices().nth(300) {
            Some((idx, _)) => &self.body[..idx],
            None => &self.body,
        }
    }
}

#[async_trait]
/// Something able to send an ApiRequest to the ordering api, authenticated when a session is known
pub trait Transport: Send {
    /// send the request and wait for the full body
    async fn send(&mut self, request: ApiRequest) -> Result<Exchange, DynError>;
}

/// Paths of the ordering api, all rooted at a common prefix
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    /// common prefix, e.g. `/api`
    pub prefix: String,
    /// login path (absolute)
    pub login: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints::with_prefix("/api")
    }
}

impl Endpoints {
    /// every path under `prefix`, login at `{prefix}/auth/login`
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        Endpoints {
            login: format!("{prefix}/auth/login"),
            prefix,
        }
    }
    /// `GET /stores` with paging
    pub fn stores(&self, page: u32, size: u32) -> String {
        format!("{}/stores?page={page}&size={size}", self.prefix)
    }
    /// `GET /stores/{id}/menus`
    pub fn menus(&self, store_id: impl Display) -> String {
        format!("{}/stores/{store_id}/menus", self.prefix)
    }
    /// `POST /orders`
    pub fn orders(&self) -> String {
        format!("{}/orders", self.prefix)
    }
    /// `GET /orders/my`, with the query already encoded
    pub fn my_orders(&self, query: &str) -> String {
        if query.is_empty() {
            format!("{}/orders/my", self.prefix)
        } else {
            format!("{}/orders/my?{query}", self.prefix)
        }
    }
}

/// builds `k=v&k=v` skipping the absent values
pub fn query_string(params: &[(&str, Option<String>)]) -> String {
    params
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{k}={v}")))
        .collect::<Vec<_>>()
        .join("&")
}
