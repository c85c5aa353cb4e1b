//! Errors returned by this crate.
use std::error::Error;

/// Which error should a transport return?
pub type DynError = Box<dyn Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
/// Possible errors returned while running a flow.
/// Non-success statuses are NOT errors: they abort the iteration and are reported as `None`.
pub enum FlowError {
    /// the request could not be built or sent by the transport
    #[error("Transport Error: {0}")]
    Transport(#[from] DynError),
    /// the body did not have any of the known shapes
    #[error("Decode Error on {endpoint}: {source}")]
    Decode {
        /// request name, as reported in the metrics
        endpoint: String,
        /// the inner serde error
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
/// Errors of the setup phase, all of them are fatal for the whole run
pub enum SetupError {
    /// login answered with something different from 200/201
    #[error("Login failed with status {status}: {body}")]
    LoginFailed {
        /// returned status (0 when no response was received)
        status: u16,
        /// first part of the body
        body: String,
    },
    /// login succeded but no token was found in the body
    #[error("Login response does not contain an access token")]
    MissingToken,
    /// the initial store listing did not answer 200
    #[error("Initial store fetch failed with status {0}")]
    StoreFetch(u16),
    /// error while running the requests
    #[error(transparent)]
    Flow(#[from] FlowError),
}

#[derive(Debug, PartialEq, thiserror::Error)]
/// Errors while reading the configuration
pub enum ConfigError {
    /// TEST_TYPE does not name a known profile
    #[error("Unknown TEST_TYPE: \"{0}\". Use one of: smoke, load, stress, spike")]
    UnknownProfile(String),
    /// SCENARIO does not name a known scenario
    #[error("Unknown SCENARIO: \"{0}\". Use one of: order, browse")]
    UnknownScenario(String),
    /// a numeric variable could not be parsed
    #[error("Invalid value for {key}: \"{value}\"")]
    InvalidNumber {
        /// variable name
        key: String,
        /// raw value
        value: String,
    },
}

#[derive(Debug, PartialEq, thiserror::Error)]
/// Errors while parsing a threshold expression
pub enum ThresholdError {
    /// the expression has no comparison operator
    #[error("missing operator in \"{0}\"")]
    MissingOperator(String),
    /// unknown aggregation
    #[error("unknown aggregation \"{0}\"")]
    UnknownAggregation(String),
    /// the right side is not a number
    #[error("invalid number \"{0}\"")]
    InvalidValue(String),
    /// p(N) outside of [0, 100]
    #[error("percentile out of range in \"{0}\"")]
    PercentileRange(String),
}
