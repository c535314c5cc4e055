//! reqwest-backed [`HttpClient`].

use crate::config::HttpConfig;
use crate::error::HttpClientError;
use actionpipe_core::{
    HttpClient, HttpRequest, HttpResponse, Method, MultipartPart, Payload, TransportError,
};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::future::Future;
use std::pin::Pin;

/// Production [`HttpClient`] over one pooled `reqwest::Client`
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    client: Client,
    config: HttpConfig,
}

impl ReqwestClient {
    /// Create a client with the given settings
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::Build`] if the TLS backend cannot be
    /// initialised or the settings are rejected.
    pub fn new(config: HttpConfig) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| HttpClientError::Build(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create a client with [`HttpConfig::default`]
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_defaults() -> Result<Self, HttpClientError> {
        Self::new(HttpConfig::default())
    }

    /// Active settings
    #[must_use]
    pub const fn config(&self) -> &HttpConfig {
        &self.config
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match request.body {
            Some(Payload::Bytes(bytes)) => builder = builder.body(bytes),
            Some(Payload::Multipart(parts)) => builder = builder.multipart(multipart_form(parts)?),
            None => {}
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(transport_error)?.to_vec();

        tracing::trace!(
            status = status.as_u16(),
            bytes = body.len(),
            "Response received"
        );

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

impl HttpClient for ReqwestClient {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(self.send(request))
    }
}

const fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
        Method::Head => reqwest::Method::HEAD,
    }
}

fn multipart_form(parts: Vec<MultipartPart>) -> Result<Form, TransportError> {
    parts.into_iter().try_fold(Form::new(), |form, part| {
        let mut body = Part::bytes(part.data);
        if let Some(file_name) = part.file_name {
            body = body.file_name(file_name);
        }
        if let Some(content_type) = &part.content_type {
            body = body.mime_str(content_type).map_err(transport_error)?;
        }
        Ok(form.part(part.name, body))
    })
}

fn transport_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::timeout(error.to_string())
    } else {
        TransportError::new(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(Method::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(to_reqwest_method(Method::Head), reqwest::Method::HEAD);
    }

    #[test]
    fn test_client_creation() {
        let client = ReqwestClient::with_defaults();
        assert!(client.is_ok());
    }
}
