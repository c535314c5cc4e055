//! Observation hooks around every dispatch.
//!
//! Interceptors see each dispatch of every action type on a client, in
//! order: `on_send` when the dispatch is accepted and validated, `on_start`
//! right before the request reaches the backend, then one of `on_success`,
//! `on_fail` or `on_cancel`. They cannot alter or veto a dispatch.

use crate::action::DispatchId;
use crate::error::ActionError;
use crate::transport::HttpRequest;
use std::fmt;

/// What an interceptor knows about a dispatch
#[derive(Clone, Copy)]
pub struct DispatchContext<'a> {
    /// Dispatch identity
    pub id: DispatchId,
    /// Short name of the action type
    pub action_type: &'static str,
    /// The dispatched descriptor
    pub action: &'a (dyn fmt::Debug + Send + Sync),
    /// The rendered request, once validation has passed
    pub request: Option<&'a HttpRequest>,
}

impl fmt::Debug for DispatchContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("id", &self.id)
            .field("action_type", &self.action_type)
            .field("action", self.action)
            .field("url", &self.request.map(|r| r.url.as_str()))
            .finish()
    }
}

/// Hooks invoked around each dispatch
///
/// All methods default to no-ops. Hooks run on the dispatching task and
/// should return quickly.
pub trait ActionInterceptor: Send + Sync {
    /// The dispatch was accepted by a pipe
    ///
    /// `ctx.request` is `None` when the descriptor failed validation; in
    /// that case `on_fail` follows immediately and `on_start` never runs.
    fn on_send(&self, _ctx: &DispatchContext<'_>) {}

    /// The request is about to be handed to the backend
    fn on_start(&self, _ctx: &DispatchContext<'_>) {}

    /// The dispatch succeeded with the given status
    fn on_success(&self, _ctx: &DispatchContext<'_>, _status: u16) {}

    /// The dispatch failed
    fn on_fail(&self, _ctx: &DispatchContext<'_>, _error: &ActionError) {}

    /// The dispatch was cancelled before it finished
    ///
    /// Runs instead of `on_success` and `on_fail`, never in addition to them.
    fn on_cancel(&self, _ctx: &DispatchContext<'_>) {}
}
