//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Policies produce:
//!     → events::PolicyListener hooks
//!         → logging.rs (TracingListener, structured log events)
//!         → metrics.rs (MetricsListener, counters and gauges)
//!     → executor.rs terminal outcomes → metrics.rs
//! ```
//!
//! # Design Decisions
//! - Listeners are attached by the policy factory, never required
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (facade calls, no-op without a recorder)

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, TracingListener};
pub use metrics::MetricsListener;
