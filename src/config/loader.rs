//! Configuration loading.
//!
//! Layers, later wins:
//! 1. built-in defaults (`ResilienceConfig::default()`)
//! 2. profile overrides selected by `RESILIENCE_ENV`
//! 3. an optional TOML file (`RESILIENCE_CONFIG` or an explicit path)
//!
//! Layers are merged table by table before deserializing, so a file only
//! needs the keys it changes.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::ResilienceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Selects the profile overrides.
pub const PROFILE_ENV: &str = "RESILIENCE_ENV";

/// Optional path to a TOML file layered on top of the profile.
pub const CONFIG_PATH_ENV: &str = "RESILIENCE_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown profile '{0}' (expected development, production or test)")]
    UnknownProfile(String),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Test,
}

impl Profile {
    /// Read `RESILIENCE_ENV`, defaulting to development when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(PROFILE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(Profile::Development),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Production => "production",
            Profile::Test => "test",
        }
    }

    fn overrides(&self) -> &'static str {
        match self {
            Profile::Development => "",
            Profile::Production => PRODUCTION_OVERRIDES,
            Profile::Test => TEST_OVERRIDES,
        }
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Profile::Development),
            "production" | "prod" => Ok(Profile::Production),
            "test" => Ok(Profile::Test),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PRODUCTION_OVERRIDES: &str = r#"
[retry]
maxAttempts = 5
initialDelay = 500
maxDelay = 60000

[circuitBreaker]
failureThreshold = 5
successThreshold = 3
breakDuration = 30000

[logging]
level = "info"
format = "json"
timestamp = true
"#;

const TEST_OVERRIDES: &str = r#"
[retry]
maxAttempts = 3
initialDelay = 100
maxDelay = 1000

[circuitBreaker]
failureThreshold = 2
successThreshold = 1
breakDuration = 500

[externalApi]
minLatency = 10
maxLatency = 50
transientFailureRate = 5
flakyFailureRate = 70
consecutiveFailureThreshold = 3

[logging]
level = "error"
format = "json"
timestamp = true

[demo]
delayBetweenGroups = 50
delayServiceDown = 100
delayRecovery = 50
"#;

/// Load using `RESILIENCE_ENV` and, if set, `RESILIENCE_CONFIG`.
pub fn load_from_env() -> Result<ResilienceConfig, ConfigError> {
    let profile = Profile::from_env()?;
    let path = env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    load(profile, path.as_deref())
}

/// Load and validate configuration from a TOML file over the environment's profile.
pub fn load_config(path: &Path) -> Result<ResilienceConfig, ConfigError> {
    load(Profile::from_env()?, Some(path))
}

/// Defaults, then `profile`, then the file at `path` if given.
pub fn load(profile: Profile, path: Option<&Path>) -> Result<ResilienceConfig, ConfigError> {
    let file = match path {
        Some(path) => Some(fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?),
        None => None,
    };

    let config = build(profile, file.as_deref())?;

    tracing::debug!(
        profile = %profile,
        file = ?path,
        "Configuration loaded"
    );
    Ok(config)
}

/// Same layering as [`load`], with the file contents supplied directly.
pub fn build(profile: Profile, overlay: Option<&str>) -> Result<ResilienceConfig, ConfigError> {
    let mut merged = toml::Value::try_from(ResilienceConfig::default())?;
    merge(&mut merged, parse_table(profile.overrides())?);
    if let Some(overlay) = overlay {
        merge(&mut merged, parse_table(overlay)?);
    }

    let config: ResilienceConfig = merged.try_into()?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn parse_table(source: &str) -> Result<toml::Value, ConfigError> {
    let table: toml::Table = toml::from_str(source)?;
    Ok(toml::Value::Table(table))
}

/// Recursive table merge; non-table values in `overlay` replace `base`.
fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use std::io::Write;

    #[test]
    fn test_development_matches_defaults() {
        let config = build(Profile::Development, None).unwrap();
        assert_eq!(config, ResilienceConfig::default());
        assert_eq!(config.retry.max_attempts, 6);
        assert_eq!(config.circuit_breaker.break_duration_ms, 10_000);
    }

    #[test]
    fn test_production_profile_overrides() {
        let config = build(Profile::Production, None).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.max_delay_ms, 60_000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.logging.format, LogFormat::Json);
        // untouched sections keep their defaults
        assert_eq!(config.external_api.max_latency, 200);
    }

    #[test]
    fn test_file_overlay_merges_per_key() {
        let overlay = r#"
            [retry]
            maxAttempts = 2

            [timeout]
            attemptTimeout = 250
        "#;
        let config = build(Profile::Test, Some(overlay)).unwrap();
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.initial_delay_ms, 100);
        assert_eq!(config.timeout.attempt_timeout_ms, Some(250));
        assert_eq!(config.circuit_breaker.break_duration_ms, 500);
    }

    #[test]
    fn test_invalid_overlay_is_rejected() {
        let overlay = "[retry]\ninitialDelay = 5000\nmaxDelay = 10\n";
        match build(Profile::Development, Some(overlay)) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        assert!(matches!(
            build(Profile::Development, Some("[retry\nmaxAttempts = ")),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("PROD".parse::<Profile>().unwrap(), Profile::Production);
        assert_eq!("test".parse::<Profile>().unwrap(), Profile::Test);
        assert!(matches!("staging".parse::<Profile>(), Err(ConfigError::UnknownProfile(_))));
    }

    #[test]
    fn test_load_reads_file() {
        let path = std::env::temp_dir().join(format!("resilient-client-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[circuitBreaker]\nbreakDuration = 1234").unwrap();

        let config = load(Profile::Development, Some(&path)).unwrap();
        assert_eq!(config.circuit_breaker.break_duration_ms, 1234);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let result = load_config(Path::new("/nonexistent/resilience.toml"));
        assert!(matches!(
            result,
            Err(ConfigError::Io { .. }) | Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load(Profile::Development, Some(Path::new("/nonexistent/resilience.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
