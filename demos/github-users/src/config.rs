//! Demo configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `GITHUB_API_URL` | `https://api.github.com` |
//! | `GITHUB_USERS_SINCE` | `0` |
//! | `HTTP_TIMEOUT_SECS` | `30` |
//! | `METRICS_ADDR` | unset (no metrics endpoint) |

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Default GitHub API root
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse
    ParseError {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },
    /// Configuration validation failed
    ValidationError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError { var, value } => write!(f, "Failed to parse {var}: '{value}'"),
            Self::ValidationError(msg) => write!(f, "Configuration validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Demo settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// API root the actions are resolved against
    pub api_url: String,
    /// `since` parameter of the users listing
    pub since: i64,
    /// Per-request timeout
    pub timeout: Duration,
    /// Where to serve Prometheus metrics, if anywhere
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            since: 0,
            timeout: Duration::from_secs(30),
            metrics_addr: None,
        }
    }
}

impl DemoConfig {
    /// Load from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable does not parse or the result is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            api_url: lookup("GITHUB_API_URL").unwrap_or(defaults.api_url),
            since: parse_var(&lookup, "GITHUB_USERS_SINCE")?.unwrap_or(defaults.since),
            timeout: parse_var(&lookup, "HTTP_TIMEOUT_SECS")?
                .map_or(defaults.timeout, Duration::from_secs),
            metrics_addr: parse_var(&lookup, "METRICS_ADDR")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "GITHUB_API_URL cannot be empty".to_string(),
            ));
        }
        if self.since < 0 {
            return Err(ConfigError::ValidationError(
                "GITHUB_USERS_SINCE must be >= 0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "HTTP_TIMEOUT_SECS must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::ParseError { var, value })
        })
        .transpose()
}
