//! # Actionpipe Core
//!
//! Core traits and types for actionpipe, a declarative-action HTTP client.
//!
//! This crate defines *what* a request is and *what* happens to it. The
//! runtime crate decides *how* it is executed and delivered.
//!
//! ## Core Concepts
//!
//! - **Action**: An immutable request descriptor implementing [`HttpAction`]
//! - **`RequestSpec`**: Method, path template, path/query params, headers and body
//! - **`ActionState`**: Lifecycle event of one dispatch (`Started`, `Succeeded`, `Failed`)
//! - **`HttpClient`**: The execution backend seam
//! - **`ActionInterceptor`**: Observation hooks around each dispatch
//!
//! ## Example
//!
//! ```
//! use actionpipe_core::{HttpAction, RequestSpec};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Repository {
//!     name: String,
//! }
//!
//! #[derive(Debug, Clone)]
//! struct UserReposAction {
//!     login: String,
//! }
//!
//! impl HttpAction for UserReposAction {
//!     type Response = Vec<Repository>;
//!
//!     fn request(&self) -> RequestSpec {
//!         RequestSpec::get("/users/{login}/repos").path_param("login", &self.login)
//!     }
//! }
//! ```

pub mod action;
pub mod error;
pub mod interceptor;
pub mod request;
pub mod transport;

// Re-export commonly used types
pub use action::{ActionResponse, ActionState, DispatchId, HttpAction};
pub use error::{ActionError, ErrorKind, TransportError};
pub use interceptor::{ActionInterceptor, DispatchContext};
pub use request::{Method, MultipartPart, RequestBody, RequestSpec, Target};
pub use transport::{HttpClient, HttpRequest, HttpResponse, Payload};
