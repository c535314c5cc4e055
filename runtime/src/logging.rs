//! Tracing interceptor.

use actionpipe_core::{ActionError, ActionInterceptor, DispatchContext};

/// Logs every dispatch through `tracing`
///
/// `on_send` and `on_start` log at `debug`, success and cancellation at
/// `info`, failure at `warn`. With [`verbose`](Self::verbose) the descriptor itself is logged
/// when the dispatch is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor {
    verbose: bool,
}

impl LoggingInterceptor {
    /// Interceptor that logs ids, action names and URLs
    #[must_use]
    pub const fn new() -> Self {
        Self { verbose: false }
    }

    /// Also log the `Debug` form of each descriptor
    #[must_use]
    pub const fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl ActionInterceptor for LoggingInterceptor {
    fn on_send(&self, ctx: &DispatchContext<'_>) {
        let url = ctx.request.map(|r| r.url.as_str());
        if self.verbose {
            tracing::debug!(
                id = ctx.id.get(),
                action = ctx.action_type,
                url,
                descriptor = ?ctx.action,
                "Action sent"
            );
        } else {
            tracing::debug!(id = ctx.id.get(), action = ctx.action_type, url, "Action sent");
        }
    }

    fn on_start(&self, ctx: &DispatchContext<'_>) {
        tracing::debug!(
            id = ctx.id.get(),
            action = ctx.action_type,
            method = ctx.request.map(|r| r.method.as_str()),
            "Action started"
        );
    }

    fn on_success(&self, ctx: &DispatchContext<'_>, status: u16) {
        tracing::info!(id = ctx.id.get(), action = ctx.action_type, status, "Action succeeded");
    }

    fn on_fail(&self, ctx: &DispatchContext<'_>, error: &ActionError) {
        tracing::warn!(
            id = ctx.id.get(),
            action = ctx.action_type,
            kind = %error.kind(),
            status = error.status(),
            error = %error,
            "Action failed"
        );
    }

    fn on_cancel(&self, ctx: &DispatchContext<'_>) {
        tracing::info!(id = ctx.id.get(), action = ctx.action_type, "Action cancelled");
    }
}
