//! API middleware.
//!
//! Includes:
//! - Request ID generation
//! - Request logging
//! - Metrics collection
//! - Caller context extraction
//! - CORS configuration

mod caller;
mod logging;
mod metrics;
mod request_id;

pub use caller::{caller_from_headers, CallerLayer, GUILD_ID_HEADER, USER_ID_HEADER};
pub use logging::RequestLoggingLayer;
pub use metrics::{MetricsLayer, RequestMetrics, StatusClass};
pub use request_id::{RequestIdLayer, REQUEST_ID_HEADER};

use tower_http::cors::{Any, CorsLayer};

/// Creates a CORS layer with permissive settings for development.
///
/// In production, you should restrict origins, methods, and headers.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}
