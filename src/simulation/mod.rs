//! Simulated remote dependency.
//!
//! Stands in for an external API: random latency, injected failures, and a
//! failure counter owned by the instance.

pub mod endpoint;

pub use endpoint::{EndpointError, SimulatedEndpoint};
