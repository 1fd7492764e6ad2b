//! Request counting middleware.
//!
//! Every response is labelled with its method, matched route and
//! [`StatusClass`], then emitted as:
//!
//! - `ticketdash_http_requests_total` (counter)
//! - `ticketdash_http_request_duration_seconds` (histogram)
//!
//! Requests that match no route are labelled `unmatched` so that scanners
//! cannot create unbounded series.

use std::{
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use axum::{
    extract::MatchedPath,
    http::{Request, Response, StatusCode},
};
use tower::{Layer, Service};

const UNMATCHED_ROUTE: &str = "unmatched";

/// Coarse grouping of response statuses used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
    Other,
}

impl StatusClass {
    const ALL: [StatusClass; 4] = [
        StatusClass::Success,
        StatusClass::ClientError,
        StatusClass::ServerError,
        StatusClass::Other,
    ];

    pub fn of(status: StatusCode) -> Self {
        if status.is_success() {
            StatusClass::Success
        } else if status.is_client_error() {
            StatusClass::ClientError
        } else if status.is_server_error() {
            StatusClass::ServerError
        } else {
            StatusClass::Other
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            StatusClass::Success => "2xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
            StatusClass::Other => "other",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Shared request tally.
///
/// Besides feeding the global recorder, counts are kept locally so they can
/// be read without a Prometheus recorder installed.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    by_class: [AtomicU64; 4],
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one finished request against `route`.
    pub fn record(&self, method: &str, route: &str, status: StatusCode, elapsed: Duration) {
        let class = StatusClass::of(status);
        self.by_class[class.index()].fetch_add(1, Ordering::Relaxed);

        let labels = [
            ("method", method.to_string()),
            ("path", route.to_string()),
            ("status_class", class.label().to_string()),
        ];
        metrics::counter!("ticketdash_http_requests_total", &labels).increment(1);
        metrics::histogram!("ticketdash_http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());
    }

    /// Requests seen so far with a status in `class`.
    pub fn count(&self, class: StatusClass) -> u64 {
        self.by_class[class.index()].load(Ordering::Relaxed)
    }

    /// All requests seen so far.
    pub fn total(&self) -> u64 {
        StatusClass::ALL.into_iter().map(|class| self.count(class)).sum()
    }
}

/// Layer that feeds a [`RequestMetrics`].
#[derive(Clone)]
pub struct MetricsLayer {
    metrics: Arc<RequestMetrics>,
}

impl MetricsLayer {
    pub fn new(metrics: Arc<RequestMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    metrics: Arc<RequestMetrics>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let started = Instant::now();
        let method = request.method().as_str().to_owned();
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map_or(UNMATCHED_ROUTE, MatchedPath::as_str)
            .to_owned();
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(request).await?;
            metrics.record(&method, &route, response.status(), started.elapsed());
            Ok(response)
        })
    }
}
