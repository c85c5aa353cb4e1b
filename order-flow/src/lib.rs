//! # The order-flow crate
//! this is the base crate of the load test: it knows how to talk to the ordering api,
//! how to pick stores and menus, how to place and verify an order, and how to judge
//! the collected metrics against the thresholds of a traffic profile.
//!
//! The crate never schedules users by itself, that part belongs to the runner
//! (see the `load-test` crate).

pub mod config;
pub mod error;
pub mod flow;
pub mod http;
pub mod metrics;
pub mod model;
pub mod order;
pub mod profile;
pub mod threshold;
pub mod transport;

/// Include this module to have all the important features of this crate
pub mod prelude;

#[cfg(test)]
mod test;
