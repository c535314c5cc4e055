//! Declarative request descriptions.
//!
//! A [`RequestSpec`] enumerates everything needed to issue one HTTP call:
//! method, path template (or absolute URL), path parameters, query
//! parameters, headers and an optional body. It is a plain value built with
//! a fluent builder and checked by [`RequestSpec::validate`] before any
//! network I/O happens.
//!
//! # Example
//!
//! ```
//! use actionpipe_core::request::{Method, RequestSpec};
//!
//! let spec = RequestSpec::get("/users/{login}/repos")
//!     .path_param("login", "octocat")
//!     .query("per_page", 10);
//!
//! assert_eq!(spec.method(), Method::Get);
//! assert!(spec.validate().is_ok());
//! ```

use crate::error::ActionError;
use crate::transport::{HttpRequest, Payload};
use serde::Serialize;
use std::fmt;
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
}

impl Method {
    /// Uppercase method name as sent on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
        }
    }

    /// Whether a request with this method may carry a body
    #[must_use]
    pub const fn permits_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Path template joined onto the client's base URL, e.g. `/users/{login}`
    Path(String),
    /// Absolute URL that bypasses the base URL
    Url(String),
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON document, sent as `application/json`
    Json(serde_json::Value),
    /// Ordered form fields, sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// Ordered parts, sent as `multipart/form-data`
    Multipart(Vec<MultipartPart>),
}

impl RequestBody {
    /// Content type to send, unless the backend chooses it
    fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Json(_) => Some(JSON_CONTENT_TYPE),
            Self::Form(_) => Some(FORM_CONTENT_TYPE),
            Self::Multipart(_) => None,
        }
    }

    fn encode(&self) -> Result<Payload, ActionError> {
        match self {
            Self::Json(value) => serde_json::to_vec(value)
                .map(Payload::Bytes)
                .map_err(|e| ActionError::validation(format!("body could not be encoded: {e}"))),
            Self::Form(fields) => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (name, value) in fields {
                    serializer.append_pair(name, value);
                }
                Ok(Payload::Bytes(serializer.finish().into_bytes()))
            }
            Self::Multipart(parts) => Ok(Payload::Multipart(parts.clone())),
        }
    }

    fn problems(&self) -> Vec<String> {
        let Self::Multipart(parts) = self else {
            return Vec::new();
        };
        if parts.is_empty() {
            return vec!["multipart body has no parts".to_string()];
        }
        parts.iter().flat_map(MultipartPart::problems).collect()
    }
}

/// One part of a `multipart/form-data` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// Form field name
    pub name: String,
    /// Part content
    pub data: Vec<u8>,
    /// File name reported to the server, for file uploads
    pub file_name: Option<String>,
    /// MIME type of the content
    pub content_type: Option<String>,
}

impl MultipartPart {
    /// Plain text field
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::bytes(name, value.into().into_bytes())
    }

    /// Binary field
    #[must_use]
    pub fn bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            file_name: None,
            content_type: None,
        }
    }

    /// Set the file name
    #[must_use]
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Set the MIME type, e.g. `image/png`
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.is_empty() {
            problems.push("multipart part has an empty name".to_string());
        }
        if self.content_type.as_deref().is_some_and(|ct| !is_mime_type(ct)) {
            problems.push(format!(
                "multipart part `{}` has invalid content type `{}`",
                self.name,
                self.content_type.as_deref().unwrap_or_default()
            ));
        }
        problems
    }
}

/// Immutable description of one HTTP call
///
/// Built with [`RequestSpec::get`] and friends, then refined with the
/// builder methods. Problems found while building (for example a body that
/// fails to serialize) are recorded and reported by [`validate`](Self::validate).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    method: Method,
    target: Target,
    path_params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
    problems: Vec<String>,
}

impl RequestSpec {
    /// Create a request with the given method and path template
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            target: Target::Path(path.into()),
            path_params: Vec::new(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            problems: Vec::new(),
        }
    }

    /// GET request for a path template
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// POST request for a path template
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// PUT request for a path template
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// PATCH request for a path template
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// DELETE request for a path template
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// HEAD request for a path template
    #[must_use]
    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::Head, path)
    }

    /// Request to an absolute URL, ignoring the client's base URL
    #[must_use]
    pub fn absolute(method: Method, url: impl Into<String>) -> Self {
        Self {
            target: Target::Url(url.into()),
            ..Self::new(method, String::new())
        }
    }

    /// Bind a `{name}` placeholder of the path template
    #[must_use]
    pub fn path_param(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.path_params.push((name.into(), value.to_string()));
        self
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Append a query parameter when a value is present
    #[must_use]
    pub fn query_opt<V: fmt::Display>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Add a request header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body serialized from `body`
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(RequestBody::Json(value)),
            Err(e) => self.problems.push(format!("body could not be serialized: {e}")),
        }
        self
    }

    /// Attach a form field, switching the body to form encoding
    #[must_use]
    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let field = (name.into(), value.into());
        match &mut self.body {
            Some(RequestBody::Form(fields)) => fields.push(field),
            _ => self.body = Some(RequestBody::Form(vec![field])),
        }
        self
    }

    /// Append a multipart part, switching the body to multipart encoding
    #[must_use]
    pub fn part(mut self, part: MultipartPart) -> Self {
        match &mut self.body {
            Some(RequestBody::Multipart(parts)) => parts.push(part),
            _ => self.body = Some(RequestBody::Multipart(vec![part])),
        }
        self
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request target
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Bound path parameters, in declaration order
    #[must_use]
    pub fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }

    /// Query parameters, in declaration order
    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    /// Request headers, in declaration order
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Request body
    #[must_use]
    pub const fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Check the request for problems that would make it unsendable
    ///
    /// All problems are collected and reported together.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Validation`] describing every problem found.
    pub fn validate(&self) -> Result<(), ActionError> {
        let mut problems = self.problems.clone();

        match &self.target {
            Target::Path(template) => problems.extend(self.template_problems(template)),
            Target::Url(raw) => {
                match Url::parse(raw) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                    Ok(url) => problems.push(format!("unsupported URL scheme `{}`", url.scheme())),
                    Err(e) => problems.push(format!("invalid URL `{raw}`: {e}")),
                }
                if !self.path_params.is_empty() {
                    problems.push("path parameters cannot be used with an absolute URL".to_string());
                }
            }
        }

        if self.body.is_some() && !self.method.permits_body() {
            problems.push(format!(
                "a body can only be sent with POST, PUT or PATCH, not {}",
                self.method
            ));
        }

        if let Some(body) = &self.body {
            problems.extend(body.problems());
        }

        problems.extend(header_problems(&self.headers));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ActionError::Validation(problems.join("; ")))
        }
    }

    fn template_problems(&self, template: &str) -> Vec<String> {
        if template.trim().is_empty() {
            return vec!["path is empty".to_string()];
        }

        let placeholders = match placeholders(template) {
            Ok(placeholders) => placeholders,
            Err(problem) => return vec![problem],
        };

        let mut problems = Vec::new();
        for placeholder in &placeholders {
            if !self.path_params.iter().any(|(name, _)| name == placeholder) {
                problems.push(format!("path placeholder `{{{placeholder}}}` is not bound"));
            }
        }
        for (name, _) in &self.path_params {
            if !placeholders.contains(&name.as_str()) {
                problems.push(format!("path parameter `{name}` does not appear in `{template}`"));
            }
        }
        problems
    }

    /// Validate and resolve into a concrete [`HttpRequest`]
    ///
    /// Path templates are joined onto `base` (keeping any base path), path
    /// parameter values are percent-encoded as single segments, query pairs
    /// are appended in declaration order, and `default_headers` are sent
    /// unless the request overrides them by name.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Validation`] if the request is invalid or cannot
    /// be resolved against `base`.
    pub fn render(
        &self,
        base: &Url,
        default_headers: &[(String, String)],
    ) -> Result<HttpRequest, ActionError> {
        self.validate()?;
        validate_headers(default_headers)?;

        let mut url = match &self.target {
            Target::Path(template) => {
                let mut url = base.clone();
                url.set_query(None);
                url.set_fragment(None);
                let segments = self.render_segments(template)?;
                {
                    let mut path = url.path_segments_mut().map_err(|()| {
                        ActionError::validation(format!("base URL `{base}` cannot carry a path"))
                    })?;
                    path.pop_if_empty();
                    for segment in &segments {
                        path.push(segment);
                    }
                }
                url
            }
            Target::Url(raw) => Url::parse(raw)
                .map_err(|e| ActionError::validation(format!("invalid URL `{raw}`: {e}")))?,
        };

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }

        let mut headers: Vec<(String, String)> = default_headers
            .iter()
            .filter(|(name, _)| {
                !self
                    .headers
                    .iter()
                    .any(|(own, _)| own.eq_ignore_ascii_case(name))
            })
            .cloned()
            .collect();
        headers.extend(self.headers.iter().cloned());

        let body = match &self.body {
            Some(body) => {
                let has_content_type = headers
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
                if let Some(content_type) = body.content_type().filter(|_| !has_content_type) {
                    headers.push(("Content-Type".to_string(), content_type.to_string()));
                }
                Some(body.encode()?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: self.method,
            url,
            headers,
            body,
        })
    }

    fn render_segments(&self, template: &str) -> Result<Vec<String>, ActionError> {
        template
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.substitute(segment))
            .collect()
    }

    fn substitute(&self, segment: &str) -> Result<String, ActionError> {
        let mut rendered = String::with_capacity(segment.len());
        let mut rest = segment;
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| ActionError::validation(format!("unclosed `{{` in `{segment}`")))?;
            let name = &after[..close];
            let value = self
                .path_params
                .iter()
                .find(|(bound, _)| bound == name)
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    ActionError::validation(format!("path placeholder `{{{name}}}` is not bound"))
                })?;
            rendered.push_str(value);
            rest = &after[close + 1..];
        }
        rendered.push_str(rest);
        Ok(rendered)
    }
}

/// Extract `{name}` placeholders from a path template
fn placeholders(template: &str) -> Result<Vec<&str>, String> {
    let mut names = Vec::new();
    let mut open: Option<usize> = None;
    for (index, c) in template.char_indices() {
        match (c, open) {
            ('{', None) => open = Some(index),
            ('{', Some(_)) => return Err(format!("nested `{{` in path `{template}`")),
            ('}', Some(start)) => {
                let name = &template[start + 1..index];
                if name.is_empty() {
                    return Err(format!("empty placeholder in path `{template}`"));
                }
                if name.contains('/') {
                    return Err(format!("placeholder spans segments in path `{template}`"));
                }
                names.push(name);
                open = None;
            }
            ('}', None) => return Err(format!("unmatched `}}` in path `{template}`")),
            _ => {}
        }
    }
    if open.is_some() {
        return Err(format!("unclosed `{{` in path `{template}`"));
    }
    Ok(names)
}

/// Check header names and values against HTTP syntax
///
/// Names must be tokens; values must be visible ASCII, spaces or tabs.
///
/// # Errors
///
/// Returns [`ActionError::Validation`] listing every offending header.
pub fn validate_headers(headers: &[(String, String)]) -> Result<(), ActionError> {
    let problems = header_problems(headers);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ActionError::Validation(problems.join("; ")))
    }
}

fn header_problems(headers: &[(String, String)]) -> Vec<String> {
    let mut problems = Vec::new();
    for (name, value) in headers {
        if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            problems.push(format!("invalid header name `{name}`"));
        }
        if http::HeaderValue::from_str(value).is_err() {
            problems.push(format!("header `{name}` has an invalid value {value:?}"));
        }
    }
    problems
}

/// `type/subtype`, optionally followed by `; parameters`
fn is_mime_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or_default().trim();
    let is_token = |part: &str| http::HeaderName::from_bytes(part.as_bytes()).is_ok();
    http::HeaderValue::from_str(value).is_ok()
        && essence
            .split_once('/')
            .is_some_and(|(kind, subtype)| is_token(kind) && is_token(subtype))
}
