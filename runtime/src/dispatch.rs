//! Per-dispatch delivery.
//!
//! Each dispatch owns a `watch` channel holding its latest lifecycle state.
//! The terminal state is written last and never replaced, so every
//! subscriber observes exactly one terminal event no matter when it
//! subscribes. A subscriber that falls behind may skip `Started`; it never
//! skips the terminal event.
//!
//! A running dispatch is settled exactly once, either by its task or by
//! [`DispatchHandle::cancel`]. Whichever settles first runs the interceptor
//! hooks and writes the terminal state; the other does nothing.

use crate::client::ClientInner;
use crate::metrics::DispatchMetrics;
use actionpipe_core::{
    ActionError, ActionInterceptor, ActionResponse, ActionState, DispatchContext, DispatchId,
    HttpAction, HttpRequest,
};
use async_stream::stream;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;

/// Message used when a dispatch task ends without writing a terminal state
pub(crate) const ABANDONED: &str = "dispatch ended before producing a result";

/// Handle on one in-flight (or finished) dispatch
///
/// Returned by [`ActionPipe::send`](crate::ActionPipe::send). Any number of
/// independent subscribers may be attached with
/// [`subscribe`](Self::subscribe); dropping one of them does not affect the
/// others or the request itself.
pub struct DispatchHandle<A: HttpAction> {
    id: DispatchId,
    action: Arc<A>,
    state: watch::Receiver<Option<ActionState<A>>>,
    control: Option<Arc<DispatchControl<A>>>,
}

impl<A: HttpAction> DispatchHandle<A> {
    pub(crate) const fn new(
        id: DispatchId,
        action: Arc<A>,
        state: watch::Receiver<Option<ActionState<A>>>,
    ) -> Self {
        Self {
            id,
            action,
            state,
            control: None,
        }
    }

    pub(crate) fn with_control(mut self, control: Arc<DispatchControl<A>>) -> Self {
        self.control = Some(control);
        self
    }

    /// Identity of this dispatch
    #[must_use]
    pub const fn id(&self) -> DispatchId {
        self.id
    }

    /// The dispatched descriptor
    #[must_use]
    pub const fn action(&self) -> &Arc<A> {
        &self.action
    }

    /// Latest state, or `None` if the dispatch has not started yet
    #[must_use]
    pub fn state(&self) -> Option<ActionState<A>> {
        self.state.borrow().clone()
    }

    /// Whether a terminal event has been produced
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state
            .borrow()
            .as_ref()
            .is_some_and(ActionState::is_terminal)
    }

    /// Stream this dispatch's events, ending after the terminal one
    ///
    /// A subscriber attached after completion receives only the terminal
    /// event.
    #[must_use]
    pub fn subscribe(&self) -> BoxStream<'static, ActionState<A>> {
        let mut rx = self.state.clone();
        let id = self.id;
        let action = Arc::clone(&self.action);

        Box::pin(stream! {
            loop {
                let current = rx.borrow_and_update().clone();
                if let Some(state) = current {
                    let terminal = state.is_terminal();
                    yield state;
                    if terminal {
                        break;
                    }
                }
                if rx.changed().await.is_err() {
                    yield abandoned(id, action);
                    break;
                }
            }
        })
    }

    /// Cancel the dispatch if it has not finished yet
    ///
    /// Best effort: the request task is aborted at its next suspension
    /// point, so the server may still have received the request. When this
    /// call wins, interceptors see `on_cancel` and every subscriber receives
    /// a terminal `Failed` carrying [`ActionError::Cancelled`]. Returns
    /// `false` if the dispatch had already finished.
    pub fn cancel(&self) -> bool {
        self.control
            .as_ref()
            .is_some_and(|control| control.cancel())
    }

    /// Wait for the terminal event
    pub async fn wait(&self) -> ActionState<A> {
        if let Some(state) = self.state.borrow().as_ref().filter(|s| s.is_terminal()) {
            return state.clone();
        }

        let mut rx = self.state.clone();
        let result = rx
            .wait_for(|state| state.as_ref().is_some_and(ActionState::is_terminal))
            .await
            .map(|state| state.clone());

        match result {
            Ok(Some(state)) => state,
            Ok(None) | Err(_) => abandoned(self.id, Arc::clone(&self.action)),
        }
    }

    /// Wait for the terminal event and unpack it
    ///
    /// # Errors
    ///
    /// Returns the [`ActionError`] carried by a `Failed` event.
    pub async fn result(&self) -> Result<Arc<ActionResponse<A::Response>>, ActionError> {
        match self.wait().await {
            ActionState::Succeeded { response, .. } => Ok(response),
            ActionState::Failed { error, .. } => Err(error),
            ActionState::Started { .. } => Err(ActionError::Transport(ABANDONED.to_string())),
        }
    }
}

impl<A: HttpAction> Clone for DispatchHandle<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            action: Arc::clone(&self.action),
            state: self.state.clone(),
            control: self.control.clone(),
        }
    }
}

impl<A: HttpAction> fmt::Debug for DispatchHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn abandoned<A: HttpAction>(id: DispatchId, action: Arc<A>) -> ActionState<A> {
    ActionState::Failed {
        id,
        action,
        error: ActionError::Transport(ABANDONED.to_string()),
    }
}

/// Writes one dispatch's events to its watch channel and the type broadcast
pub(crate) struct Emitter<A: HttpAction> {
    state: watch::Sender<Option<ActionState<A>>>,
    events: broadcast::Sender<ActionState<A>>,
}

impl<A: HttpAction> Emitter<A> {
    pub(crate) const fn new(
        state: watch::Sender<Option<ActionState<A>>>,
        events: broadcast::Sender<ActionState<A>>,
    ) -> Self {
        Self { state, events }
    }

    /// Publish `event` unless a terminal state was already written
    pub(crate) fn emit(&self, event: ActionState<A>) -> bool {
        let accepted = self.state.send_if_modified(|current| {
            if current.as_ref().is_some_and(ActionState::is_terminal) {
                return false;
            }
            *current = Some(event.clone());
            true
        });
        if accepted {
            // No observers is fine.
            let _ = self.events.send(event);
        }
        accepted
    }
}

/// State shared by a dispatch task and the handles on it
pub(crate) struct DispatchControl<A: HttpAction> {
    client: Arc<ClientInner>,
    id: DispatchId,
    action: Arc<A>,
    request: HttpRequest,
    emitter: Emitter<A>,
    created: Instant,
    settled: AtomicBool,
    task: OnceLock<AbortHandle>,
}

impl<A: HttpAction> DispatchControl<A> {
    pub(crate) fn new(
        client: Arc<ClientInner>,
        id: DispatchId,
        action: Arc<A>,
        request: HttpRequest,
        emitter: Emitter<A>,
    ) -> Self {
        Self {
            client,
            id,
            action,
            request,
            emitter,
            created: Instant::now(),
            settled: AtomicBool::new(false),
            task: OnceLock::new(),
        }
    }

    /// Remember the spawned task so it can be aborted
    pub(crate) fn attach(&self, task: AbortHandle) {
        // Attached once, right after spawning.
        let _ = self.task.set(task);
    }

    fn context(&self) -> DispatchContext<'_> {
        DispatchContext {
            id: self.id,
            action_type: A::name(),
            action: &*self.action,
            request: Some(&self.request),
        }
    }

    /// Claim the right to write the terminal state
    fn settle(&self) -> bool {
        self.settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn cancel(&self) -> bool {
        if !self.settle() {
            return false;
        }
        if let Some(task) = self.task.get() {
            task.abort();
        }

        let name = A::name();
        let ctx = self.context();
        DispatchMetrics::record_failure(
            name,
            ActionError::Cancelled.kind(),
            self.created.elapsed(),
        );
        notify(&self.client.interceptors, |i| i.on_cancel(&ctx));
        tracing::debug!(id = self.id.get(), action = name, "Dispatch cancelled");
        self.emitter.emit(ActionState::Failed {
            id: self.id,
            action: Arc::clone(&self.action),
            error: ActionError::Cancelled,
        });
        true
    }
}

/// One validated dispatch, ready to run on the client's runtime
pub(crate) struct DispatchTask<A: HttpAction> {
    pub(crate) control: Arc<DispatchControl<A>>,
}

impl<A: HttpAction> DispatchTask<A> {
    pub(crate) async fn run(self) {
        let control = &*self.control;
        let id = control.id;
        let name = A::name();
        let ctx = control.context();

        if control.settled.load(Ordering::Acquire) {
            return;
        }
        notify(&control.client.interceptors, |i| i.on_start(&ctx));
        control.emitter.emit(ActionState::Started {
            id,
            action: Arc::clone(&control.action),
        });

        tracing::debug!(
            id = id.get(),
            action = name,
            method = %control.request.method,
            url = %control.request.url,
            "Executing request"
        );

        let started = Instant::now();
        let outcome = match control.client.http.execute(control.request.clone()).await {
            Ok(raw) => ActionResponse::<A::Response>::decode(raw),
            Err(error) => Err(ActionError::from(error)),
        };
        let elapsed = started.elapsed();

        if !control.settle() {
            tracing::debug!(id = id.get(), action = name, "Result dropped after cancellation");
            return;
        }

        match outcome {
            Ok(response) => {
                DispatchMetrics::record_success(name, elapsed);
                notify(&control.client.interceptors, |i| i.on_success(&ctx, response.status));
                tracing::debug!(
                    id = id.get(),
                    action = name,
                    status = response.status,
                    elapsed_ms = elapsed.as_millis(),
                    "Dispatch succeeded"
                );
                control.emitter.emit(ActionState::Succeeded {
                    id,
                    action: Arc::clone(&control.action),
                    response: Arc::new(response),
                });
            }
            Err(error) => {
                DispatchMetrics::record_failure(name, error.kind(), elapsed);
                notify(&control.client.interceptors, |i| i.on_fail(&ctx, &error));
                tracing::debug!(
                    id = id.get(),
                    action = name,
                    kind = %error.kind(),
                    error = %error,
                    "Dispatch failed"
                );
                control.emitter.emit(ActionState::Failed {
                    id,
                    action: Arc::clone(&control.action),
                    error,
                });
            }
        }
    }
}

pub(crate) fn notify<F>(interceptors: &[Arc<dyn ActionInterceptor>], f: F)
where
    F: Fn(&dyn ActionInterceptor),
{
    for interceptor in interceptors {
        f(interceptor.as_ref());
    }
}
