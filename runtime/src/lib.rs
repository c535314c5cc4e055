//! # Actionpipe Runtime
//!
//! Runtime for actionpipe: turns immutable [`HttpAction`] descriptors into
//! observable dispatches.
//!
//! ## Core Components
//!
//! - **`ActionClient`**: Binds a base URL to an HTTP backend and hands out pipes
//! - **`ActionPipe`**: Per-type channel to dispatch, send and observe actions
//! - **`DispatchHandle`**: One in-flight dispatch, subscribable any number of times
//! - **Chaining**: [`then_dispatch`] and [`ActionStreamExt`] derive a follow-up
//!   dispatch from a first result
//!
//! ## Delivery guarantees
//!
//! Every dispatch produces exactly one terminal event (`Succeeded` or
//! `Failed`) and performs at most one network call. Dispatches are
//! independent: concurrent dispatches of the same action type never share
//! state beyond the type's broadcast channel.
//!
//! ## Example
//!
//! ```ignore
//! use actionpipe_http::ReqwestClient;
//! use actionpipe_runtime::{ActionClient, ActionStreamExt, LoggingInterceptor};
//! use futures::StreamExt;
//!
//! let client = ActionClient::builder()
//!     .base_url("https://api.github.com")
//!     .http_client(ReqwestClient::with_defaults()?)
//!     .interceptor(LoggingInterceptor::new())
//!     .build()?;
//!
//! let users = client.pipe::<UsersAction>();
//! let mut events = users.dispatch(UsersAction { since: 0 });
//! while let Some(state) = events.next().await {
//!     println!("{state:?}");
//! }
//! ```
//!
//! [`HttpAction`]: actionpipe_core::HttpAction

/// Chaining dependent dispatches
pub mod chain;

/// The caller-facing client and its builder
pub mod client;

/// Client configuration
pub mod config;

/// Per-dispatch delivery and handles
pub mod dispatch;

/// Tracing interceptor
pub mod logging;

/// Prometheus metrics for observability
pub mod metrics;

/// Action pipes
pub mod pipe;

/// Error types for the runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while building an
    /// [`ActionClient`](crate::ActionClient)
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum BuildError {
        /// No base URL was given
        #[error("Base URL is required")]
        MissingBaseUrl,

        /// The base URL does not parse or cannot be used for requests
        #[error("Invalid base URL '{url}': {message}")]
        InvalidBaseUrl {
            /// The rejected URL
            url: String,
            /// Why it was rejected
            message: String,
        },

        /// No HTTP backend was given
        #[error("HTTP client is required")]
        MissingHttpClient,

        /// A configured default header is not valid HTTP
        #[error("Invalid default header: {0}")]
        InvalidDefaultHeader(String),

        /// No runtime was given and none is current
        ///
        /// Build inside a Tokio runtime or pass one with
        /// [`ActionClientBuilder::runtime`](crate::ActionClientBuilder::runtime).
        #[error("No Tokio runtime available")]
        NoRuntime,
    }
}

pub use chain::{ActionStreamExt, ChainStream, first_item, then_dispatch};
pub use client::{ActionClient, ActionClientBuilder};
pub use config::ClientConfig;
pub use dispatch::DispatchHandle;
pub use error::BuildError;
pub use logging::LoggingInterceptor;
pub use pipe::{ActionPipe, ActionStream, ObserveStream};
