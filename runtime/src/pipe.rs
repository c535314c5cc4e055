//! Action pipes.
//!
//! An [`ActionPipe`] is the per-type channel between callers, the HTTP
//! backend and observers:
//!
//! - [`send`](ActionPipe::send) starts a dispatch now and returns a handle
//! - [`dispatch`](ActionPipe::dispatch) returns a lazy stream that starts the
//!   dispatch when first polled
//! - [`observe_all`](ActionPipe::observe_all) streams every event of every
//!   dispatch of this type on the client
//!
//! A pipe holds no per-dispatch state, so it stays usable after any number
//! of failures.

use crate::client::ClientInner;
use crate::dispatch::{DispatchControl, DispatchHandle, DispatchTask, Emitter, notify};
use crate::metrics::DispatchMetrics;
use actionpipe_core::{
    ActionError, ActionResponse, ActionState, DispatchContext, HttpAction, HttpRequest,
};
use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::Instrument;

/// Events of one dispatch, ending after its terminal event
pub type ActionStream<A> = BoxStream<'static, ActionState<A>>;

/// Events of every dispatch of one action type; does not end on its own
pub type ObserveStream<A> = BoxStream<'static, ActionState<A>>;

/// Per-type channel for dispatching and observing actions
///
/// Obtained from [`ActionClient::pipe`](crate::ActionClient::pipe). Cheap to
/// clone.
pub struct ActionPipe<A: HttpAction> {
    client: Arc<ClientInner>,
    events: broadcast::Sender<ActionState<A>>,
}

impl<A: HttpAction> ActionPipe<A> {
    pub(crate) const fn new(
        client: Arc<ClientInner>,
        events: broadcast::Sender<ActionState<A>>,
    ) -> Self {
        Self { client, events }
    }

    /// Start a dispatch immediately
    ///
    /// Validation runs synchronously. A descriptor that fails validation
    /// yields a handle that is already finished with
    /// [`ActionError::Validation`]; the backend is never called. Otherwise
    /// the request runs on the client's runtime and this call returns at
    /// once.
    #[tracing::instrument(skip(self, action), name = "pipe_send", fields(action = A::name()))]
    pub fn send(&self, action: A) -> DispatchHandle<A> {
        self.send_shared(Arc::new(action))
    }

    /// Start a dispatch of a descriptor that is already shared
    pub fn send_shared(&self, action: Arc<A>) -> DispatchHandle<A> {
        let id = self.client.next_dispatch_id();
        let name = A::name();
        DispatchMetrics::record_dispatch(name);

        let prepared = self.prepare(&action);
        {
            let ctx = DispatchContext {
                id,
                action_type: name,
                action: &*action,
                request: prepared.as_ref().ok(),
            };
            notify(&self.client.interceptors, |i| i.on_send(&ctx));
            if let Err(error) = &prepared {
                DispatchMetrics::record_failure(name, error.kind(), Duration::ZERO);
                notify(&self.client.interceptors, |i| i.on_fail(&ctx, error));
            }
        }

        match prepared {
            Err(error) => {
                tracing::debug!(id = id.get(), action = name, error = %error, "Dispatch rejected");

                let failed = ActionState::Failed {
                    id,
                    action: Arc::clone(&action),
                    error,
                };
                let (state, receiver) = watch::channel(None);
                Emitter::new(state, self.events.clone()).emit(failed);
                DispatchHandle::new(id, action, receiver)
            }
            Ok(request) => {
                let (state, receiver) = watch::channel(None);
                let control = Arc::new(DispatchControl::new(
                    Arc::clone(&self.client),
                    id,
                    Arc::clone(&action),
                    request,
                    Emitter::new(state, self.events.clone()),
                ));
                let task = DispatchTask {
                    control: Arc::clone(&control),
                };
                let span = tracing::debug_span!("dispatch", id = id.get(), action = name);
                let join = self.client.runtime.spawn(task.run().instrument(span));
                control.attach(join.abort_handle());
                DispatchHandle::new(id, action, receiver).with_control(control)
            }
        }
    }

    fn prepare(&self, action: &A) -> Result<HttpRequest, ActionError> {
        action.validate()?;
        action
            .request()
            .render(&self.client.base_url, self.client.config.default_headers())
    }

    /// Lazy stream of one dispatch's events
    ///
    /// Nothing is sent until the stream is first polled. The stream yields
    /// `Started` (unless the descriptor is invalid) and then exactly one
    /// terminal event, then ends. Dropping it early abandons interest; the
    /// request itself keeps running. Use [`send`](Self::send) and
    /// [`DispatchHandle::cancel`] to stop it. Call `dispatch` again to repeat the
    /// request.
    #[must_use]
    pub fn dispatch(&self, action: A) -> ActionStream<A> {
        let pipe = self.clone();
        Box::pin(stream! {
            let handle = pipe.send(action);
            let mut events = handle.subscribe();
            while let Some(state) = events.next().await {
                yield state;
            }
        })
    }

    /// Send a dispatch and wait for its result
    ///
    /// # Errors
    ///
    /// Returns the [`ActionError`] of the terminal `Failed` event.
    pub async fn execute(
        &self,
        action: A,
    ) -> Result<Arc<ActionResponse<A::Response>>, ActionError> {
        self.send(action).result().await
    }

    /// Every event of every dispatch of this action type on the client
    ///
    /// The subscription starts when this method is called, so events of
    /// dispatches sent afterwards are never missed unless the observer lags
    /// more than the configured broadcast capacity behind; lagged events are
    /// skipped with a warning. The stream does not end on its own.
    #[must_use]
    pub fn observe_all(&self) -> ObserveStream<A> {
        let mut rx = self.events.subscribe();
        Box::pin(stream! {
            loop {
                match rx.recv().await {
                    Ok(state) => yield state,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            skipped,
                            action = A::name(),
                            "Action observer lagged, {} events skipped",
                            skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Successful results of every dispatch of this action type
    #[must_use]
    pub fn observe_success(
        &self,
    ) -> BoxStream<'static, (Arc<A>, Arc<ActionResponse<A::Response>>)> {
        self.observe_all()
            .filter_map(|state| async move {
                match state {
                    ActionState::Succeeded {
                        action, response, ..
                    } => Some((action, response)),
                    ActionState::Started { .. } | ActionState::Failed { .. } => None,
                }
            })
            .boxed()
    }

    /// Number of live `observe_all` subscriptions for this action type
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.events.receiver_count()
    }

    #[cfg(test)]
    pub(crate) fn shares_channel_with(&self, other: &Self) -> bool {
        self.events.same_channel(&other.events)
    }
}

impl<A: HttpAction> Clone for ActionPipe<A> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            events: self.events.clone(),
        }
    }
}

impl<A: HttpAction> fmt::Debug for ActionPipe<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionPipe")
            .field("action", &A::name())
            .field("observers", &self.observer_count())
            .finish_non_exhaustive()
    }
}
