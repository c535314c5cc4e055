//! Client configuration.

/// Default number of events buffered per action type for `observe_all`
/// subscribers before slow observers start lagging.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Tunables for an [`ActionClient`](crate::ActionClient)
///
/// # Example
///
/// ```
/// use actionpipe_runtime::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_broadcast_capacity(256)
///     .with_default_header("Accept", "application/vnd.github+json");
///
/// assert_eq!(config.broadcast_capacity(), 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    broadcast_capacity: usize,
    default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// Events buffered per action type for broadcast observers (at least 1)
    #[must_use]
    pub const fn broadcast_capacity(&self) -> usize {
        self.broadcast_capacity
    }

    /// Headers sent with every request unless the request overrides them
    #[must_use]
    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    /// Set the broadcast capacity (minimum 1)
    #[must_use]
    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Add a header sent with every request
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            default_headers: Vec::new(),
        }
    }
}
