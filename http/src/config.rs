//! Transport configuration.

use std::time::Duration;

/// Default total request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default `User-Agent` header
pub const DEFAULT_USER_AGENT: &str = concat!("actionpipe/", env!("CARGO_PKG_VERSION"));

/// Settings for [`ReqwestClient`](crate::ReqwestClient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Total time allowed per request, including reading the body
    pub timeout: Duration,
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,
    /// `User-Agent` sent with every request
    pub user_agent: String,
}

impl HttpConfig {
    /// Set the total request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the `User-Agent`
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("actionpipe/"));
    }

    #[test]
    fn test_builders() {
        let config = HttpConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("github-users-demo");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "github-users-demo");
    }
}
