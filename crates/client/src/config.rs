use std::str::FromStr;
use std::time::Duration;

/// Default service port used by the GeoEngine proxy.
pub const DEFAULT_PORT: u16 = 9876;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Read `var`, falling back to `default` when it is unset or empty.
pub fn env_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(env_opt(var)?.unwrap_or(default))
}

/// Read and parse `var` if it is set to a non-empty value.
pub fn env_opt<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::Invalid {
                    var,
                    value,
                    reason: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}

/// Connection settings for the GeoEngine service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                          | Default     |
    /// |----------------------------------|-------------|
    /// | `GEOENGINE_HOST`                 | `localhost` |
    /// | `GEOENGINE_PORT`                 | `9876`      |
    /// | `GEOENGINE_REQUEST_TIMEOUT_SECS` | `30`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or("GEOENGINE_HOST", "localhost".to_string())?;
        let port = env_or("GEOENGINE_PORT", DEFAULT_PORT)?;
        let timeout_secs = env_or("GEOENGINE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        Ok(Self {
            host,
            port,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Base HTTP URL of the service, e.g. `http://localhost:9876`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
