//! Chaining dependent dispatches.
//!
//! A chain waits for the terminal event of a first dispatch, projects its
//! successful response into at most one follow-up action and streams that
//! action's events.
//!
//! ```ignore
//! use actionpipe_runtime::{ActionStreamExt, first_item};
//!
//! let repos = users
//!     .dispatch(UsersAction { since: 0 })
//!     .then_dispatch(
//!         &client.pipe::<UserReposAction>(),
//!         first_item(|user: &User| UserReposAction::new(&user.login)),
//!     );
//! ```

use crate::pipe::ActionPipe;
use actionpipe_core::{ActionError, ActionResponse, ActionState, HttpAction};
use async_stream::stream;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::pin::pin;
use std::sync::Arc;

/// Stream produced by a chain
///
/// `Err` carries the first dispatch's failure and is the only item in that
/// case. Every `Ok` item is an event of the follow-up dispatch, including its
/// own `Failed` event.
pub type ChainStream<B> = BoxStream<'static, Result<ActionState<B>, ActionError>>;

/// Dispatch a follow-up action derived from the result of `first`
///
/// - `first` fails: yields `Err` with its error, then ends; `next` is never
///   dispatched
/// - `project` returns `None`: ends without items or dispatch
/// - otherwise: exactly one dispatch on `next`, whose events are yielded
///
/// Nothing happens until the returned stream is polled. Events of `first`
/// other than its terminal one are consumed silently.
pub fn then_dispatch<A, B, S, F>(first: S, next: ActionPipe<B>, project: F) -> ChainStream<B>
where
    A: HttpAction,
    B: HttpAction,
    S: Stream<Item = ActionState<A>> + Send + 'static,
    F: FnOnce(&A::Response) -> Option<B> + Send + 'static,
{
    Box::pin(stream! {
        match next_terminal(first).await {
            Some(ActionState::Failed { id, error, .. }) => {
                tracing::debug!(
                    id = id.get(),
                    action = A::name(),
                    next = B::name(),
                    "Chain stopped, first dispatch failed"
                );
                yield Err(error);
            }
            Some(ActionState::Succeeded { id, response, .. }) => {
                if let Some(action) = project(&response.body) {
                    let mut events = next.dispatch(action);
                    while let Some(event) = events.next().await {
                        yield Ok(event);
                    }
                } else {
                    tracing::debug!(
                        id = id.get(),
                        action = A::name(),
                        next = B::name(),
                        "Chain ended, nothing to dispatch"
                    );
                }
            }
            Some(ActionState::Started { .. }) | None => {}
        }
    })
}

/// Projection that builds a follow-up from the first element of a list
///
/// Yields `None` for an empty list, which ends the chain.
pub fn first_item<T, B, F>(build: F) -> impl FnOnce(&Vec<T>) -> Option<B> + Send + 'static
where
    T: 'static,
    B: 'static,
    F: FnOnce(&T) -> B + Send + 'static,
{
    move |items: &Vec<T>| items.first().map(build)
}

/// First terminal event of a stream, or `None` if it ends without one
async fn next_terminal<A, S>(stream: S) -> Option<ActionState<A>>
where
    A: HttpAction,
    S: Stream<Item = ActionState<A>>,
{
    let mut stream = pin!(stream);
    while let Some(state) = stream.next().await {
        if state.is_terminal() {
            return Some(state);
        }
    }
    None
}

/// Combinators on streams of action events
pub trait ActionStreamExt<A: HttpAction>:
    Stream<Item = ActionState<A>> + Send + Sized + 'static
{
    /// Method form of [`then_dispatch`]
    fn then_dispatch<B, F>(self, next: &ActionPipe<B>, project: F) -> ChainStream<B>
    where
        B: HttpAction,
        F: FnOnce(&A::Response) -> Option<B> + Send + 'static,
    {
        then_dispatch(self, next.clone(), project)
    }

    /// Wait for the first terminal event
    ///
    /// Resolves to `None` if the stream ends without one.
    fn terminal(self) -> BoxFuture<'static, Option<ActionState<A>>> {
        Box::pin(next_terminal(self))
    }

    /// Only the successful responses
    fn successes(self) -> BoxStream<'static, Arc<ActionResponse<A::Response>>> {
        self.filter_map(|state| async move {
            match state {
                ActionState::Succeeded { response, .. } => Some(response),
                ActionState::Started { .. } | ActionState::Failed { .. } => None,
            }
        })
        .boxed()
    }
}

impl<A, S> ActionStreamExt<A> for S
where
    A: HttpAction,
    S: Stream<Item = ActionState<A>> + Send + Sized + 'static,
{
}
