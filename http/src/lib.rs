//! # Actionpipe HTTP
//!
//! Production [`HttpClient`](actionpipe_core::HttpClient) for actionpipe,
//! backed by a single pooled `reqwest::Client` with rustls.
//!
//! ## Example
//!
//! ```no_run
//! use actionpipe_http::{HttpConfig, ReqwestClient};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), actionpipe_http::HttpClientError> {
//! let http = ReqwestClient::new(
//!     HttpConfig::default().with_timeout(Duration::from_secs(10)),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::ReqwestClient;
pub use config::HttpConfig;
pub use error::HttpClientError;
