//! Contains some reexport from this crate and other dependencies.
//! use:
//! ```
//! use order_flow::prelude::*;
//! ```
//! to have all thats needed to write a scenario

pub use crate::config::*;
pub use crate::error::*;
pub use crate::flow::*;
pub use crate::http::*;
pub use crate::metrics::*;
pub use crate::model::*;
pub use crate::order::*;
pub use crate::profile::*;
pub use crate::threshold::*;
pub use crate::transport::*;

/// async_trait re-export, needed to implement Transport
pub use async_trait::async_trait;
/// serde_json re-export
pub use serde_json;
