//! Sends the flow requests through a GooseUser, so they land in the goose report.
use async_trait::async_trait;
use goose::{goose::TransactionError, prelude::*};
use order_flow::{
    error::DynError,
    transport::{ApiRequest, Exchange, Method, Session, Transport},
};

/// Transport backed by the current goose user, every request carries the session token
pub struct GooseTransport<'a> {
    user: &'a mut GooseUser,
    session: &'a Session,
}

impl<'a> GooseTransport<'a> {
    /// wrap the user for the duration of a transaction
    pub fn new(user: &'a mut GooseUser, session: &'a Session) -> Self {
        GooseTransport { user, session }
    }
}

// TransactionError carries goose internals, only its message is kept
fn goose_error(e: Box<TransactionError>) -> DynError {
    e.to_string().into()
}

#[async_trait]
impl<'a> Transport for GooseTransport<'a> {
    async fn send(&mut self, request: ApiRequest) -> Result<Exchange, DynError> {
        let method = match request.method {
            Method::Get => GooseMethod::Get,
            Method::Post => GooseMethod::Post,
        };
        let mut request_builder = self
            .user
            .get_request_builder(&method, &request.path)
            .map_err(goose_error)?
            .bearer_auth(&self.session.access_token);
        if let Some(body) = &request.body {
            request_builder = request_builder
                .header("Content-Type", "application/json")
                .body(body.to_string());
        }

        let goose_request = GooseRequest::builder()
            .set_request_builder(request_builder)
            .name(request.name)
            .build();
        let goose = self.user.request(goose_request).await.map_err(goose_error)?;

        let elapsed_ms = goose.request.response_time;
        Ok(match goose.response {
            Ok(response) => {
                let status = response.status().as_u16();
                Exchange::read(status, response.text().await, elapsed_ms)
            }
            Err(e) => Exchange {
                status: 0,
                body: e.to_string(),
                elapsed_ms,
            },
        })
    }
}
