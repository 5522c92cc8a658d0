//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → profile overrides (RESILIENCE_ENV)
//!     → optional TOML file (RESILIENCE_CONFIG / --config)
//!     → loader.rs (merge & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; policies are built from a snapshot
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{
    build, load, load_config, load_from_env, ConfigError, Profile, CONFIG_PATH_ENV, PROFILE_ENV,
};
pub use schema::{
    CircuitBreakerConfig, DemoConfig, ExternalApiConfig, LogFormat, LoggingConfig,
    ResilienceConfig, RetryConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
