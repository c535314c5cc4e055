//! Prometheus metrics for dispatches.
//!
//! Every dispatch records:
//! - `actionpipe_dispatches_total{action}` when it is sent
//! - `actionpipe_dispatch_failures_total{action, kind}` when it fails
//! - `actionpipe_dispatch_duration_seconds{action, outcome}` for the request
//!
//! Metrics go to whatever global recorder is installed; without one they
//! are no-ops. [`MetricsServer`] installs a Prometheus recorder and serves
//! it over HTTP.
//!
//! # Example
//!
//! ```rust,no_run
//! use actionpipe_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use actionpipe_core::ErrorKind;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

const DISPATCHES_TOTAL: &str = "actionpipe_dispatches_total";
const FAILURES_TOTAL: &str = "actionpipe_dispatch_failures_total";
const DURATION_SECONDS: &str = "actionpipe_dispatch_duration_seconds";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the Prometheus recorder and start serving `/metrics`.
    ///
    /// Must be called from within a Tokio runtime; the listener runs as a
    /// spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the exporter cannot be built or the
    /// address cannot be bound.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), the new one is
    /// discarded with a warning, nothing is served and [`handle`](Self::handle)
    /// stays `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Full(DURATION_SECONDS.to_string()),
                &[
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let (recorder, exporter) = builder
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
            return Ok(());
        }

        register_metrics();
        let addr = self.addr;
        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!(addr = %addr, "Metrics listener stopped");
            }
        });

        self.handle = Some(handle);
        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(DISPATCHES_TOTAL, "Total number of dispatches sent");
    describe_counter!(
        FAILURES_TOTAL,
        "Total number of dispatches that ended in Failed, by error kind"
    );
    describe_histogram!(
        DURATION_SECONDS,
        "Time from handing a request to the backend until its result was decoded"
    );
}

/// Dispatch metrics recorder.
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a dispatch being sent.
    pub fn record_dispatch(action: &'static str) {
        counter!(DISPATCHES_TOTAL, "action" => action).increment(1);
    }

    /// Record a successful dispatch.
    pub fn record_success(action: &'static str, duration: Duration) {
        histogram!(DURATION_SECONDS, "action" => action, "outcome" => "success")
            .record(duration.as_secs_f64());
    }

    /// Record a failed dispatch.
    ///
    /// Validation failures never reach the backend and record no duration.
    pub fn record_failure(action: &'static str, kind: ErrorKind, duration: Duration) {
        counter!(FAILURES_TOTAL, "action" => action, "kind" => kind.as_str()).increment(1);
        if kind != ErrorKind::Validation {
            histogram!(DURATION_SECONDS, "action" => action, "outcome" => "failure")
                .record(duration.as_secs_f64());
        }
    }
}
