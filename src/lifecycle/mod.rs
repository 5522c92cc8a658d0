//! Lifecycle management for the demo driver.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     Ctrl-C → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → CancellationToken cancelled → in-flight policies return Cancelled
//! ```
//!
//! # Design Decisions
//! - One token per process, cloned into every call
//! - A second Ctrl-C is left to the default handler

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::listen_for_ctrl_c;
