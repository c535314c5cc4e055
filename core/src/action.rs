//! Request descriptors and their lifecycle events.
//!
//! An [`HttpAction`] is an immutable value that knows how to describe itself
//! as a [`RequestSpec`] and names the type its response decodes into. Each
//! dispatch of an action produces a short sequence of [`ActionState`]
//! events: `Started`, then exactly one of `Succeeded` or `Failed`.
//!
//! The request value and the result value are kept apart. The action is
//! never mutated to hold its response; instead both travel together inside
//! the event, correlated by a [`DispatchId`].

use crate::error::ActionError;
use crate::request::RequestSpec;
use crate::transport::HttpResponse;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// A declarative HTTP request descriptor
///
/// # Example
///
/// ```
/// use actionpipe_core::{ActionError, HttpAction, RequestSpec};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct User {
///     login: String,
/// }
///
/// #[derive(Debug, Clone)]
/// struct UsersAction {
///     since: i64,
/// }
///
/// impl HttpAction for UsersAction {
///     type Response = Vec<User>;
///
///     fn request(&self) -> RequestSpec {
///         RequestSpec::get("/users").query("since", self.since)
///     }
///
///     fn validate(&self) -> Result<(), ActionError> {
///         if self.since < 0 {
///             return Err(ActionError::validation("since must not be negative"));
///         }
///         Ok(())
///     }
/// }
///
/// assert!(UsersAction { since: -1 }.validate().is_err());
/// ```
pub trait HttpAction: fmt::Debug + Send + Sync + 'static {
    /// Type the response body is deserialized into
    type Response: DeserializeOwned + fmt::Debug + Send + Sync + 'static;

    /// Describe the HTTP call
    fn request(&self) -> RequestSpec;

    /// Reject descriptors whose field values are unacceptable
    ///
    /// Runs before the request is rendered. The default accepts everything.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Validation`] when the descriptor must not be sent.
    fn validate(&self) -> Result<(), ActionError> {
        Ok(())
    }

    /// Short name used in logs and metrics
    fn name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Identity of one dispatch
///
/// Unique within the client that assigned it and increasing in dispatch
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DispatchId(u64);

impl DispatchId {
    /// Wrap a raw id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Decoded result of a successful dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse<T> {
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Reason phrase
    pub reason: String,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Decoded body
    pub body: T,
}

impl<T: DeserializeOwned> ActionResponse<T> {
    /// Classify and decode a raw response
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<_>`
    /// response types accept `204 No Content`.
    ///
    /// # Errors
    ///
    /// - [`ActionError::Upstream`] for a non-2xx status
    /// - [`ActionError::Deserialization`] if the body does not match `T`
    pub fn decode(response: HttpResponse) -> Result<Self, ActionError> {
        if !response.is_success() {
            return Err(ActionError::Upstream {
                status: response.status,
                reason: response.reason.clone(),
                body: response.text(),
            });
        }

        let bytes: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &response.body
        };

        let body = serde_json::from_slice(bytes).map_err(|e| ActionError::Deserialization {
            status: response.status,
            message: e.to_string(),
        })?;

        Ok(Self {
            status: response.status,
            reason: response.reason,
            headers: response.headers,
            body,
        })
    }
}

impl<T> ActionResponse<T> {
    /// Look up a header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Lifecycle event of one dispatch
///
/// `Started` is emitted when the request is handed to the backend.
/// `Succeeded` and `Failed` are terminal: a dispatch produces exactly one of
/// them and nothing after it. A descriptor that fails validation produces
/// `Failed` without a preceding `Started`.
#[derive(Debug)]
pub enum ActionState<A: HttpAction> {
    /// The request was submitted to the backend
    Started {
        /// Dispatch identity
        id: DispatchId,
        /// The dispatched descriptor
        action: Arc<A>,
    },
    /// The request completed with a 2xx status and a decodable body
    Succeeded {
        /// Dispatch identity
        id: DispatchId,
        /// The dispatched descriptor
        action: Arc<A>,
        /// Decoded response
        response: Arc<ActionResponse<A::Response>>,
    },
    /// The request failed
    Failed {
        /// Dispatch identity
        id: DispatchId,
        /// The dispatched descriptor
        action: Arc<A>,
        /// Cause of the failure
        error: ActionError,
    },
}

impl<A: HttpAction> Clone for ActionState<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Started { id, action } => Self::Started {
                id: *id,
                action: Arc::clone(action),
            },
            Self::Succeeded {
                id,
                action,
                response,
            } => Self::Succeeded {
                id: *id,
                action: Arc::clone(action),
                response: Arc::clone(response),
            },
            Self::Failed { id, action, error } => Self::Failed {
                id: *id,
                action: Arc::clone(action),
                error: error.clone(),
            },
        }
    }
}

impl<A: HttpAction> ActionState<A> {
    /// Identity of the dispatch this event belongs to
    #[must_use]
    pub const fn id(&self) -> DispatchId {
        match self {
            Self::Started { id, .. } | Self::Succeeded { id, .. } | Self::Failed { id, .. } => *id,
        }
    }

    /// The dispatched descriptor
    #[must_use]
    pub const fn action(&self) -> &Arc<A> {
        match self {
            Self::Started { action, .. }
            | Self::Succeeded { action, .. }
            | Self::Failed { action, .. } => action,
        }
    }

    /// Whether this event ends the dispatch
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Whether this is a `Succeeded` event
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// The decoded response, for `Succeeded` events
    #[must_use]
    pub const fn response(&self) -> Option<&Arc<ActionResponse<A::Response>>> {
        match self {
            Self::Succeeded { response, .. } => Some(response),
            Self::Started { .. } | Self::Failed { .. } => None,
        }
    }

    /// The failure cause, for `Failed` events
    #[must_use]
    pub const fn error(&self) -> Option<&ActionError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Started { .. } | Self::Succeeded { .. } => None,
        }
    }

    /// Terminal outcome as a `Result`, or `None` for `Started`
    #[must_use]
    pub fn outcome(&self) -> Option<Result<&A::Response, &ActionError>> {
        match self {
            Self::Started { .. } => None,
            Self::Succeeded { response, .. } => Some(Ok(&response.body)),
            Self::Failed { error, .. } => Some(Err(error)),
        }
    }
}

/// Strip the module path and generic arguments from a type name
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
