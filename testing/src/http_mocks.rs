//! Contract-based mock HTTP backend
//!
//! A [`MockHttpClient`] answers requests from a list of contracts, each a
//! predicate bound to an outcome. The first matching contract wins; a
//! request no contract matches fails with a transport error, so tests
//! notice calls they did not expect. Every executed request is recorded.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use actionpipe_core::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Predicate deciding whether a contract applies to a request
pub type RequestPredicate = Arc<dyn Fn(&HttpRequest) -> bool + Send + Sync>;

/// Canned response returned by a contract
///
/// # Example
///
/// ```
/// use actionpipe_testing::MockResponse;
///
/// let response = MockResponse::json(&serde_json::json!([{ "login": "alice" }]))
///     .header("X-RateLimit-Remaining", "59");
/// assert_eq!(response.status(), 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    delay: Option<Duration>,
}

impl MockResponse {
    /// Empty response with the given status
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: Vec::new(),
            delay: None,
        }
    }

    /// Empty `200 OK`
    #[must_use]
    pub const fn ok() -> Self {
        Self::new(200)
    }

    /// `200 OK` with a JSON body
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(body: &T) -> Self {
        Self::ok()
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(body).unwrap())
    }

    /// Replace the status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Replace the reason phrase
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add a response header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the raw body
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Delay this response
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Status code
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    fn to_http(&self) -> HttpResponse {
        HttpResponse {
            status: self.status,
            reason: self
                .reason
                .clone()
                .unwrap_or_else(|| canonical_reason(self.status).to_string()),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

fn canonical_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[derive(Clone)]
enum Outcome {
    Respond(MockResponse),
    Fail { message: String, timeout: bool },
}

#[derive(Clone)]
struct Contract {
    predicate: RequestPredicate,
    outcome: Outcome,
}

/// Mock [`HttpClient`] driven by contracts
///
/// Clones share contracts and the request log, so a test can hand one clone
/// to an `ActionClient` and assert on another.
///
/// # Example
///
/// ```
/// use actionpipe_testing::{MockHttpClient, MockResponse, path_is};
///
/// let mock = MockHttpClient::builder()
///     .bind(MockResponse::json(&serde_json::json!([])), path_is("/users"))
///     .build();
/// assert_eq!(mock.request_count(), 0);
/// ```
#[derive(Clone)]
pub struct MockHttpClient {
    contracts: Arc<Vec<Contract>>,
    latency: Option<Duration>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockHttpClient {
    /// Start building a mock
    #[must_use]
    pub fn builder() -> MockHttpClientBuilder {
        MockHttpClientBuilder::default()
    }

    /// Every request executed so far, in arrival order
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests executed so far
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of recorded requests matching a predicate
    #[must_use]
    pub fn count_matching(&self, predicate: impl Fn(&HttpRequest) -> bool) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| predicate(r))
            .count()
    }

    /// Highest number of requests observed executing at the same time
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn outcome_for(&self, request: &HttpRequest) -> Option<Outcome> {
        self.contracts
            .iter()
            .find(|c| (c.predicate)(request))
            .map(|c| c.outcome.clone())
    }
}

impl fmt::Debug for MockHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHttpClient")
            .field("contracts", &self.contracts.len())
            .field("latency", &self.latency)
            .field("requests", &self.request_count())
            .finish_non_exhaustive()
    }
}

impl HttpClient for MockHttpClient {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

            let outcome = self.outcome_for(&request);
            let delay = match &outcome {
                Some(Outcome::Respond(response)) => response.delay.or(self.latency),
                _ => self.latency,
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match outcome {
                Some(Outcome::Respond(response)) => Ok(response.to_http()),
                Some(Outcome::Fail { message, timeout: true }) => {
                    Err(TransportError::timeout(message))
                }
                Some(Outcome::Fail { message, .. }) => Err(TransportError::new(message)),
                None => Err(TransportError::new(format!(
                    "no contract for {} {}",
                    request.method, request.url
                ))),
            }
        })
    }
}

/// Builder for [`MockHttpClient`]
#[derive(Default)]
pub struct MockHttpClientBuilder {
    contracts: Vec<Contract>,
    latency: Option<Duration>,
}

impl MockHttpClientBuilder {
    /// Answer requests matching `predicate` with `response`
    #[must_use]
    pub fn bind(
        mut self,
        response: MockResponse,
        predicate: impl Fn(&HttpRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.contracts.push(Contract {
            predicate: Arc::new(predicate),
            outcome: Outcome::Respond(response),
        });
        self
    }

    /// Fail requests matching `predicate` with a transport error
    #[must_use]
    pub fn fail(
        mut self,
        predicate: impl Fn(&HttpRequest) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        self.contracts.push(Contract {
            predicate: Arc::new(predicate),
            outcome: Outcome::Fail {
                message: message.into(),
                timeout: false,
            },
        });
        self
    }

    /// Fail requests matching `predicate` as if they timed out
    #[must_use]
    pub fn time_out(
        mut self,
        predicate: impl Fn(&HttpRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.contracts.push(Contract {
            predicate: Arc::new(predicate),
            outcome: Outcome::Fail {
                message: "request timed out".to_string(),
                timeout: true,
            },
        });
        self
    }

    /// Delay every response that has no delay of its own
    #[must_use]
    pub const fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Build the mock
    #[must_use]
    pub fn build(self) -> MockHttpClient {
        MockHttpClient {
            contracts: Arc::new(self.contracts),
            latency: self.latency,
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Matches every request
#[must_use]
pub fn any_request() -> impl Fn(&HttpRequest) -> bool + Send + Sync + 'static {
    |_| true
}

/// Matches requests whose URL path equals `path`
#[must_use]
pub fn path_is(path: impl Into<String>) -> impl Fn(&HttpRequest) -> bool + Send + Sync + 'static {
    let path = path.into();
    move |request| request.url.path() == path
}

/// Matches requests with the given method
#[must_use]
pub fn method_is(method: Method) -> impl Fn(&HttpRequest) -> bool + Send + Sync + 'static {
    move |request| request.method == method
}

/// Matches requests carrying query parameter `name` with `value`
#[must_use]
pub fn query_is(
    name: impl Into<String>,
    value: impl Into<String>,
) -> impl Fn(&HttpRequest) -> bool + Send + Sync + 'static {
    let name = name.into();
    let value = value.into();
    move |request| request.query_param(&name).as_deref() == Some(value.as_str())
}

/// Matches requests carrying header `name` (case-insensitive) with `value`
#[must_use]
pub fn header_is(
    name: impl Into<String>,
    value: impl Into<String>,
) -> impl Fn(&HttpRequest) -> bool + Send + Sync + 'static {
    let name = name.into();
    let value = value.into();
    move |request| request.header(&name) == Some(value.as_str())
}
