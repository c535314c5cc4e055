//! Interceptor that records every hook call

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use actionpipe_core::{ActionError, ActionInterceptor, DispatchContext, DispatchId, ErrorKind};
use std::sync::{Arc, Mutex};

/// One recorded interceptor hook call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorCall {
    /// `on_send`; `rendered` is false when validation failed
    Send {
        /// Dispatch identity
        id: DispatchId,
        /// Action type name
        action_type: &'static str,
        /// Whether a request was rendered
        rendered: bool,
    },
    /// `on_start`
    Start {
        /// Dispatch identity
        id: DispatchId,
        /// Action type name
        action_type: &'static str,
    },
    /// `on_success`
    Success {
        /// Dispatch identity
        id: DispatchId,
        /// Response status
        status: u16,
    },
    /// `on_fail`
    Fail {
        /// Dispatch identity
        id: DispatchId,
        /// Error classification
        kind: ErrorKind,
    },
    /// `on_cancel`
    Cancel {
        /// Dispatch identity
        id: DispatchId,
    },
}

impl InterceptorCall {
    /// Dispatch the call belongs to
    #[must_use]
    pub const fn id(&self) -> DispatchId {
        match self {
            Self::Send { id, .. }
            | Self::Start { id, .. }
            | Self::Success { id, .. }
            | Self::Fail { id, .. }
            | Self::Cancel { id } => *id,
        }
    }

    /// Hook name (`send`, `start`, `success`, `fail` or `cancel`)
    #[must_use]
    pub const fn hook(&self) -> &'static str {
        match self {
            Self::Send { .. } => "send",
            Self::Start { .. } => "start",
            Self::Success { .. } => "success",
            Self::Fail { .. } => "fail",
            Self::Cancel { .. } => "cancel",
        }
    }
}

/// Records interceptor calls for later assertions
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingInterceptor {
    calls: Arc<Mutex<Vec<InterceptorCall>>>,
}

impl RecordingInterceptor {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<InterceptorCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Hook names called for one dispatch, in order
    #[must_use]
    pub fn hooks_for(&self, id: DispatchId) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.id() == id)
            .map(InterceptorCall::hook)
            .collect()
    }

    fn record(&self, call: InterceptorCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ActionInterceptor for RecordingInterceptor {
    fn on_send(&self, ctx: &DispatchContext<'_>) {
        self.record(InterceptorCall::Send {
            id: ctx.id,
            action_type: ctx.action_type,
            rendered: ctx.request.is_some(),
        });
    }

    fn on_start(&self, ctx: &DispatchContext<'_>) {
        self.record(InterceptorCall::Start {
            id: ctx.id,
            action_type: ctx.action_type,
        });
    }

    fn on_success(&self, ctx: &DispatchContext<'_>, status: u16) {
        self.record(InterceptorCall::Success { id: ctx.id, status });
    }

    fn on_fail(&self, ctx: &DispatchContext<'_>, error: &ActionError) {
        self.record(InterceptorCall::Fail {
            id: ctx.id,
            kind: error.kind(),
        });
    }

    fn on_cancel(&self, ctx: &DispatchContext<'_>) {
        self.record(InterceptorCall::Cancel { id: ctx.id });
    }
}
