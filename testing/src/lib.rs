//! # Actionpipe Testing
//!
//! Testing utilities for actionpipe.
//!
//! This crate provides:
//! - [`MockHttpClient`]: contract-based HTTP backend that records requests
//! - [`RecordingInterceptor`]: captures interceptor hook calls
//! - [`init_test_tracing`]: opt-in log output for tests
//!
//! ## Example
//!
//! ```ignore
//! use actionpipe_runtime::ActionClient;
//! use actionpipe_testing::{MockHttpClient, MockResponse, path_is};
//! use std::sync::Arc;
//!
//! #[tokio::test]
//! async fn test_users() {
//!     let mock = MockHttpClient::builder()
//!         .bind(MockResponse::json(&users), path_is("/users"))
//!         .build();
//!     let client = ActionClient::builder()
//!         .base_url("https://api.github.com")
//!         .shared_http_client(Arc::new(mock.clone()))
//!         .build()
//!         .unwrap();
//!
//!     let response = client.pipe::<UsersAction>().execute(UsersAction { since: 0 }).await.unwrap();
//!     assert_eq!(mock.request_count(), 1);
//! }
//! ```

pub mod http_mocks;
pub mod interceptor_mocks;

pub use http_mocks::{
    MockHttpClient, MockHttpClientBuilder, MockResponse, RequestPredicate, any_request,
    header_is, method_is, path_is, query_is,
};
pub use interceptor_mocks::{InterceptorCall, RecordingInterceptor};

/// Install a `tracing` subscriber that writes through the test harness
///
/// Filtered by `RUST_LOG` (default `warn`). Safe to call from every test;
/// only the first call installs anything.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
