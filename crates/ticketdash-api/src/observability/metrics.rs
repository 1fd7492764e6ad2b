//! Prometheus metrics infrastructure.
//!
//! Metrics are recorded through the `metrics` facade and rendered by
//! `metrics-exporter-prometheus`.
//!
//! # Metrics Exposed
//!
//! - `ticketdash_http_requests_total` - HTTP requests by method, path, status class
//! - `ticketdash_http_request_duration_seconds` - HTTP request duration
//! - `ticketdash_inputs_reconciliations_total` - Reconciliations by outcome
//! - `ticketdash_inputs_reconciliation_duration_seconds` - Reconciliation duration
//! - `ticketdash_storage_query_duration_seconds` - PostgreSQL query duration
//! - `ticketdash_storage_query_timeout_total` - PostgreSQL query timeouts

use std::sync::Arc;

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Shared state containing the Prometheus handle for metrics rendering.
#[derive(Clone)]
pub struct MetricsState {
    handle: Arc<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Renders the current metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Error type for metrics initialization.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: recorder already installed")]
    AlreadyInstalled,
}

/// Installs the global Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<MetricsState, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|_| MetricsError::AlreadyInstalled)?;

    describe_metrics();

    Ok(MetricsState::new(handle))
}

fn describe_metrics() {
    metrics::describe_counter!(
        "ticketdash_http_requests_total",
        "Total number of HTTP requests"
    );
    metrics::describe_histogram!(
        "ticketdash_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    metrics::describe_counter!(
        "ticketdash_inputs_reconciliations_total",
        "Input reconciliation requests by outcome"
    );
    metrics::describe_histogram!(
        "ticketdash_inputs_reconciliation_duration_seconds",
        "Input reconciliation duration in seconds"
    );
    metrics::describe_histogram!(
        "ticketdash_storage_query_duration_seconds",
        "Storage query duration in seconds by operation and status"
    );
    metrics::describe_counter!(
        "ticketdash_storage_query_timeout_total",
        "Total number of storage query timeouts by operation"
    );
}

/// Prometheus exposition format content type.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Handler for the metrics endpoint.
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Only one recorder can be installed per process, so these tests build
    // unattached recorders.

    #[test]
    fn test_render_includes_recorded_metric() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let state = MetricsState::new(recorder.handle());

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("ticketdash_inputs_reconciliations_total", "outcome" => "committed")
                .increment(1);
        });

        let output = state.render();
        assert!(output.contains("ticketdash_inputs_reconciliations_total"));
        assert!(output.contains("outcome=\"committed\""));
    }

    #[tokio::test]
    async fn test_metrics_handler_sets_content_type() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let response = metrics_handler(State(MetricsState::new(recorder.handle())))
            .await
            .into_response();

        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            PROMETHEUS_CONTENT_TYPE
        );
    }
}
