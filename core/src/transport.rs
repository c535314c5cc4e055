//! The HTTP execution seam.
//!
//! Pipes never talk to the network themselves. They resolve a
//! [`RequestSpec`](crate::request::RequestSpec) into an [`HttpRequest`] and
//! hand it to an [`HttpClient`]: `ReqwestClient` in production, a mock in
//! tests.

use crate::error::TransportError;
use crate::request::{Method, MultipartPart};
use std::future::Future;
use std::pin::Pin;
use url::Url;

/// A fully resolved outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including the query string
    pub url: Url,
    /// Headers in send order (defaults first, then request headers)
    pub headers: Vec<(String, String)>,
    /// Body, if any
    pub body: Option<Payload>,
}

/// Body of an outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Encoded bytes, described by the request's `Content-Type` header
    Bytes(Vec<u8>),
    /// `multipart/form-data` parts; the backend picks the boundary and sets
    /// the `Content-Type` header
    Multipart(Vec<MultipartPart>),
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Encoded body bytes, unless the body is absent or multipart
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Some(Payload::Bytes(bytes)) => Some(bytes),
            Some(Payload::Multipart(_)) | None => None,
        }
    }

    /// Value of a query parameter, if present
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// A raw response as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase (may be empty)
    pub reason: String,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Check if the response status indicates success (2xx)
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes HTTP requests on behalf of pipes
///
/// One client is shared by every dispatch of every action type on an
/// `ActionClient`, so implementations must be safe for concurrent use by
/// many in-flight requests.
///
/// Non-2xx statuses are *not* errors at this level: return them as an
/// [`HttpResponse`] and let the pipe classify them. Return a
/// [`TransportError`] only when no response was obtained.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so that clients can be held as `Arc<dyn HttpClient>`.
pub trait HttpClient: Send + Sync {
    /// Execute one request
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the exchange could not be completed.
    fn execute(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>>;
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        let mut response = HttpResponse {
            status: 200,
            ..HttpResponse::default()
        };
        assert!(response.is_success());
        response.status = 299;
        assert!(response.is_success());
        response.status = 304;
        assert!(!response.is_success());
        response.status = 199;
        assert!(!response.is_success());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("X-RateLimit-Remaining".to_string(), "59".to_string())],
            ..HttpResponse::default()
        };
        assert_eq!(response.header("x-ratelimit-remaining"), Some("59"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_query_param() {
        let request = HttpRequest {
            method: Method::Get,
            url: Url::parse("https://api.github.com/users?since=42").unwrap(),
            headers: Vec::new(),
            body: None,
        };
        assert_eq!(request.query_param("since").as_deref(), Some("42"));
        assert_eq!(request.query_param("page"), None);
    }

    #[test]
    fn test_text_is_lossy() {
        let response = HttpResponse {
            status: 200,
            body: vec![b'o', b'k', 0xff],
            ..HttpResponse::default()
        };
        assert_eq!(response.text(), "ok\u{fffd}");
    }
}
