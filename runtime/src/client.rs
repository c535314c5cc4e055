//! The caller-facing client.
//!
//! An [`ActionClient`] binds a base URL to an HTTP backend and hands out
//! one [`ActionPipe`] per action type. Every pipe of the same type on the
//! same client shares one broadcast channel, so `observe_all` sees every
//! dispatch of that type no matter which pipe instance started it.

use crate::config::ClientConfig;
use crate::error::BuildError;
use crate::pipe::ActionPipe;
use actionpipe_core::request::validate_headers;
use actionpipe_core::{ActionInterceptor, ActionState, DispatchId, HttpAction, HttpClient};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use url::Url;

/// Shared state behind every clone of a client and its pipes
pub(crate) struct ClientInner {
    pub(crate) base_url: Url,
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) interceptors: Vec<Arc<dyn ActionInterceptor>>,
    pub(crate) config: ClientConfig,
    pub(crate) runtime: Handle,
    channels: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    next_id: AtomicU64,
}

impl ClientInner {
    pub(crate) fn next_dispatch_id(&self) -> DispatchId {
        DispatchId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Broadcast sender for action type `A`, created on first use
    fn channel<A: HttpAction>(&self) -> broadcast::Sender<ActionState<A>> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = channels.entry(TypeId::of::<A>()).or_insert_with(|| {
            let (sender, _) = broadcast::channel::<ActionState<A>>(self.config.broadcast_capacity());
            Box::new(sender)
        });

        if let Some(sender) = entry.downcast_ref::<broadcast::Sender<ActionState<A>>>() {
            sender.clone()
        } else {
            // Keyed by `TypeId::of::<A>()`, so the downcast cannot miss.
            let (sender, _) = broadcast::channel::<ActionState<A>>(self.config.broadcast_capacity());
            *entry = Box::new(sender.clone());
            sender
        }
    }
}

/// Declarative-action HTTP client
///
/// Cheap to clone; clones share the backend, interceptors, broadcast
/// channels and dispatch id sequence.
///
/// # Example
///
/// ```ignore
/// use actionpipe_http::ReqwestClient;
/// use actionpipe_runtime::ActionClient;
///
/// let client = ActionClient::builder()
///     .base_url("https://api.github.com")
///     .http_client(ReqwestClient::with_defaults()?)
///     .build()?;
///
/// let users = client.pipe::<UsersAction>();
/// let response = users.execute(UsersAction::default()).await?;
/// ```
#[derive(Clone)]
pub struct ActionClient {
    inner: Arc<ClientInner>,
}

impl ActionClient {
    /// Start building a client
    #[must_use]
    pub fn builder() -> ActionClientBuilder {
        ActionClientBuilder::default()
    }

    /// Obtain the pipe for action type `A`
    #[must_use]
    pub fn pipe<A: HttpAction>(&self) -> ActionPipe<A> {
        let events = self.inner.channel::<A>();
        ActionPipe::new(Arc::clone(&self.inner), events)
    }

    /// Base URL path templates are resolved against
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl fmt::Debug for ActionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("interceptors", &self.inner.interceptors.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ActionClient`]
#[derive(Default)]
pub struct ActionClientBuilder {
    base_url: Option<String>,
    http: Option<Arc<dyn HttpClient>>,
    interceptors: Vec<Arc<dyn ActionInterceptor>>,
    config: ClientConfig,
    runtime: Option<Handle>,
}

impl ActionClientBuilder {
    /// Base URL for path templates (required, http or https)
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// HTTP execution backend (required)
    #[must_use]
    pub fn http_client(self, http: impl HttpClient + 'static) -> Self {
        self.shared_http_client(Arc::new(http))
    }

    /// HTTP execution backend already behind an `Arc`
    ///
    /// Useful to share one backend between clients, or to keep a handle on a
    /// mock for assertions.
    #[must_use]
    pub fn shared_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Register an interceptor; interceptors run in registration order
    #[must_use]
    pub fn interceptor(mut self, interceptor: impl ActionInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Register an interceptor already behind an `Arc`
    #[must_use]
    pub fn shared_interceptor(mut self, interceptor: Arc<dyn ActionInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Replace the client configuration
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Tokio runtime dispatches are spawned on
    ///
    /// Defaults to the runtime current at [`build`](Self::build) time.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// - [`BuildError::MissingBaseUrl`] / [`BuildError::MissingHttpClient`]: required part not set
    /// - [`BuildError::InvalidBaseUrl`]: the base URL does not parse, is not
    ///   http/https, or cannot carry a path
    /// - [`BuildError::InvalidDefaultHeader`]: a default header is not valid HTTP
    /// - [`BuildError::NoRuntime`]: no runtime given and none is current
    pub fn build(self) -> Result<ActionClient, BuildError> {
        let raw = self.base_url.ok_or(BuildError::MissingBaseUrl)?;
        let base_url = Url::parse(&raw).map_err(|e| BuildError::InvalidBaseUrl {
            url: raw.clone(),
            message: e.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(BuildError::InvalidBaseUrl {
                url: raw,
                message: "expected an http or https URL".to_string(),
            });
        }

        validate_headers(self.config.default_headers())
            .map_err(|e| BuildError::InvalidDefaultHeader(e.to_string()))?;

        let http = self.http.ok_or(BuildError::MissingHttpClient)?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };

        tracing::debug!(
            base_url = %base_url,
            interceptors = self.interceptors.len(),
            "Action client built"
        );

        Ok(ActionClient {
            inner: Arc::new(ClientInner {
                base_url,
                http,
                interceptors: self.interceptors,
                config: self.config,
                runtime,
                channels: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use actionpipe_core::{HttpRequest, HttpResponse, RequestSpec, TransportError};
    use std::future::Future;
    use std::pin::Pin;

    struct NoopHttp;

    impl HttpClient for NoopHttp {
        fn execute(
            &self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
            Box::pin(async { Err(TransportError::new("noop")) })
        }
    }

    #[derive(Debug)]
    struct Ping;

    impl HttpAction for Ping {
        type Response = ();

        fn request(&self) -> RequestSpec {
            RequestSpec::get("/ping")
        }
    }

    #[tokio::test]
    async fn test_build_requires_base_url() {
        let result = ActionClient::builder().http_client(NoopHttp).build();
        assert!(matches!(result, Err(BuildError::MissingBaseUrl)));
    }

    #[tokio::test]
    async fn test_build_requires_http_client() {
        let result = ActionClient::builder().base_url("https://api.github.com").build();
        assert!(matches!(result, Err(BuildError::MissingHttpClient)));
    }

    #[tokio::test]
    async fn test_build_rejects_bad_base_urls() {
        for url in ["not a url", "ftp://example.com", "mailto:someone@example.com"] {
            let result = ActionClient::builder()
                .base_url(url)
                .http_client(NoopHttp)
                .build();
            assert!(
                matches!(result, Err(BuildError::InvalidBaseUrl { .. })),
                "{url} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_build_rejects_bad_default_headers() {
        let result = ActionClient::builder()
            .base_url("https://api.github.com")
            .http_client(NoopHttp)
            .config(ClientConfig::default().with_default_header("Accept", "a\nb"))
            .build();
        assert!(matches!(result, Err(BuildError::InvalidDefaultHeader(_))));
    }

    #[tokio::test]
    async fn test_zero_broadcast_capacity_is_usable() {
        let client = ActionClient::builder()
            .base_url("https://api.github.com")
            .http_client(NoopHttp)
            .config(ClientConfig::default().with_broadcast_capacity(0))
            .build()
            .unwrap();

        let pipe = client.pipe::<Ping>();
        let mut observer = pipe.observe_all();
        assert!(pipe.execute(Ping).await.is_err());
        assert!(futures::StreamExt::next(&mut observer).await.is_some());
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = ActionClient::builder()
            .base_url("https://api.github.com")
            .http_client(NoopHttp)
            .build();
        assert!(matches!(result, Err(BuildError::NoRuntime)));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let client = ActionClient::builder()
            .base_url("https://api.github.com")
            .http_client(NoopHttp)
            .runtime(runtime.handle().clone())
            .build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_pipes_of_same_type_share_channel() {
        let client = ActionClient::builder()
            .base_url("https://api.github.com")
            .http_client(NoopHttp)
            .build()
            .unwrap();

        let first = client.pipe::<Ping>();
        let second = client.clone().pipe::<Ping>();
        assert!(first.shares_channel_with(&second));
    }

    #[tokio::test]
    async fn test_dispatch_ids_increase() {
        let client = ActionClient::builder()
            .base_url("https://api.github.com")
            .http_client(NoopHttp)
            .build()
            .unwrap();

        let a = client.inner.next_dispatch_id();
        let b = client.inner.next_dispatch_id();
        assert!(b > a);
        assert_eq!(a, DispatchId::new(1));
    }
}
