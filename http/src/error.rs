//! Error types for the reqwest backend

use thiserror::Error;

/// Errors that can occur when creating a [`ReqwestClient`](crate::ReqwestClient)
///
/// Request failures are reported per dispatch as
/// [`TransportError`](actionpipe_core::TransportError), not here.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The underlying `reqwest::Client` could not be built
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}
