//! Error taxonomy for dispatched actions.
//!
//! Every failure of a dispatch is captured at the dispatch boundary and
//! delivered as a single [`ActionState::Failed`](crate::action::ActionState::Failed)
//! event carrying one of these errors. Nothing here is fatal to a pipe.

use std::fmt;
use thiserror::Error;

/// Errors that terminate a single dispatch
///
/// The error is `Clone` so that one terminal event can be delivered to any
/// number of subscribers. Causes are carried as rendered messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The request descriptor is malformed
    ///
    /// Raised before any network I/O: unbound path placeholders, a body on a
    /// method that cannot carry one, a rejected field value, and so on.
    #[error("Invalid action: {0}")]
    Validation(String),

    /// The HTTP backend failed to complete the exchange
    ///
    /// Connection refused, DNS failure, timeout, or a backend that has no
    /// answer for the request.
    #[error("Transport failed: {0}")]
    Transport(String),

    /// The response body did not match the expected response type
    #[error("Response deserialization failed (status {status}): {message}")]
    Deserialization {
        /// HTTP status code of the response that failed to decode
        status: u16,
        /// Decoder error message
        message: String,
    },

    /// The upstream API answered with a non-2xx status
    #[error("Upstream error (status {status} {reason})")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Reason phrase (may be empty)
        reason: String,
        /// Raw response body, lossily decoded as UTF-8
        body: String,
    },

    /// The caller cancelled the dispatch before it finished
    #[error("Dispatch cancelled")]
    Cancelled,
}

impl ActionError {
    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Deserialization { .. } => ErrorKind::Deserialization,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status associated with the failure, if a response was received
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Deserialization { status, .. } | Self::Upstream { status, .. } => Some(*status),
            Self::Validation(_) | Self::Transport(_) | Self::Cancelled => None,
        }
    }
}

impl From<TransportError> for ActionError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error.to_string())
    }
}

/// Coarse classification of an [`ActionError`]
///
/// Used as a low-cardinality label for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed descriptor
    Validation,
    /// Network or backend failure
    Transport,
    /// Response shape mismatch
    Deserialization,
    /// Non-2xx HTTP status
    Upstream,
    /// Cancelled by the caller
    Cancelled,
}

impl ErrorKind {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transport => "transport",
            Self::Deserialization => "deserialization",
            Self::Upstream => "upstream",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by an [`HttpClient`](crate::transport::HttpClient) backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    timed_out: bool,
}

impl TransportError {
    /// Create a transport error from a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a transport error for an exchange that exceeded its deadline
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Whether the exchange timed out
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        self.timed_out
    }

    /// The error message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
