//! HTTP route definitions and handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};
use tracing::error;

use ticketdash_domain::model::{FormId, InputsUpdate};
use ticketdash_server::Caller;
use ticketdash_storage::FormStore;

use super::state::AppState;
use crate::errors::{error_codes, ApiError, ApiResult};
use crate::middleware::{
    cors_layer, CallerLayer, MetricsLayer, RequestIdLayer, RequestLoggingLayer, RequestMetrics,
};
use crate::observability::{metrics_handler, MetricsState};

/// JSON extractor that rejects malformed bodies with 400 instead of axum's
/// 422. Body limit failures keep their 413.
pub struct JsonBadRequest<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBadRequest<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBadRequest(value)),
            Err(rejection) => Err(body_rejection(rejection.status(), rejection.body_text())),
        }
    }
}

/// Raw JSON body, decoded only once the handler has checked its path
/// parameters, so a bad `form_id` is reported ahead of a bad body.
pub struct DeferredJson(Bytes);

#[async_trait]
impl<S> FromRequest<S> for DeferredJson
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Bytes::from_request(req, state)
            .await
            .map(DeferredJson)
            .map_err(|rejection| body_rejection(rejection.status(), rejection.body_text()))
    }
}

impl DeferredJson {
    fn decode<T: serde::de::DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_slice(&self.0).map_err(|e| {
            ApiError::validation_error(format!(
                "Failed to deserialize the JSON body into the target type: {e}"
            ))
        })
    }
}

fn body_rejection(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(error_codes::PAYLOAD_TOO_LARGE, message)
    } else {
        ApiError::validation_error(message)
    }
}

/// Default request body size limit (1MB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Form routes. Every one of them requires caller headers.
fn api_routes<S: FormStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/forms", post(create_form::<S>))
        .route(
            "/forms/:form_id",
            get(get_form::<S>)
                .patch(rename_form::<S>)
                .delete(delete_form::<S>),
        )
        .route("/forms/:form_id/inputs", patch(update_inputs::<S>))
        .layer(CallerLayer::new())
}

/// Creates the HTTP router with the default body size limit.
pub fn create_router<S: FormStore>(state: AppState<S>) -> Router {
    create_router_with_body_limit(state, DEFAULT_BODY_LIMIT)
}

/// Creates the HTTP router with a custom body size limit.
pub fn create_router_with_body_limit<S: FormStore>(
    state: AppState<S>,
    body_limit: usize,
) -> Router {
    api_routes::<S>()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<S>))
        .with_state(Arc::new(state))
        .layer(RequestBodyLimitLayer::new(body_limit))
}

/// Creates the HTTP router plus a Prometheus endpoint at `metrics_path`.
pub fn create_router_with_observability<S: FormStore>(
    state: AppState<S>,
    metrics_state: MetricsState,
    metrics_path: &str,
    body_limit: usize,
) -> Router {
    let observability_router = Router::new()
        .route(metrics_path, get(metrics_handler))
        .with_state(metrics_state);

    create_router_with_body_limit(state, body_limit).merge(observability_router)
}

/// Wraps a router in the standard middleware stack.
///
/// Outermost first: CORS, request id, metrics, logging, timeout.
pub fn apply_middleware(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestLoggingLayer::new())
        .layer(MetricsLayer::new(Arc::new(RequestMetrics::new())))
        .layer(RequestIdLayer::new())
        .layer(cors_layer())
}

/// Parses the `form_id` path segment.
fn parse_form_id(raw: &str) -> ApiResult<FormId> {
    raw.parse::<FormId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::invalid_form_id(raw))
}

// ============================================================
// Health and Readiness Checks
// ============================================================

/// Liveness check. Does not touch dependencies.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness check: 200 when storage answers its health check, 503 otherwise.
///
/// Failure details are logged, not returned.
async fn readiness_check<S: FormStore>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    match state.storage.health_check().await {
        Ok(status) if status.healthy => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "checks": { "storage": "ok" }
            })),
        ),
        Ok(status) => {
            error!(message = ?status.message, "readiness check failed: storage unhealthy");
            not_ready()
        }
        Err(e) => {
            error!(error = %e, "readiness check failed: storage unavailable");
            not_ready()
        }
    }
}

fn not_ready() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({
            "status": "not_ready",
            "checks": { "storage": "unavailable" }
        })),
    )
}

// ============================================================
// Forms
// ============================================================

/// Body of create and rename requests.
#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

async fn create_form<S: FormStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(caller): Extension<Caller>,
    JsonBadRequest(body): JsonBadRequest<TitleRequest>,
) -> ApiResult<impl IntoResponse> {
    let form = state
        .forms
        .create(caller, &body.title)
        .await
        .map_err(|e| ApiError::from_forms_error(e, &state.errors))?;
    Ok(Json(form))
}

async fn get_form<S: FormStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(caller): Extension<Caller>,
    Path(form_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let form_id = parse_form_id(&form_id)?;
    let details = state
        .forms
        .get(caller, form_id)
        .await
        .map_err(|e| ApiError::from_forms_error(e, &state.errors))?;
    Ok(Json(details))
}

async fn rename_form<S: FormStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(caller): Extension<Caller>,
    Path(form_id): Path<String>,
    body: DeferredJson,
) -> ApiResult<impl IntoResponse> {
    let form_id = parse_form_id(&form_id)?;
    let body: TitleRequest = body.decode()?;
    let form = state
        .forms
        .rename(caller, form_id, &body.title)
        .await
        .map_err(|e| ApiError::from_forms_error(e, &state.errors))?;
    Ok(Json(form))
}

async fn delete_form<S: FormStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(caller): Extension<Caller>,
    Path(form_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let form_id = parse_form_id(&form_id)?;
    state
        .forms
        .delete(caller, form_id)
        .await
        .map_err(|e| ApiError::from_forms_error(e, &state.errors))?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Inputs
// ============================================================

async fn update_inputs<S: FormStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(caller): Extension<Caller>,
    Path(form_id): Path<String>,
    body: DeferredJson,
) -> ApiResult<impl IntoResponse> {
    let form_id = parse_form_id(&form_id)?;
    let request: InputsUpdate = body.decode()?;
    state
        .inputs
        .handle(caller, form_id, request)
        .await
        .map_err(|e| ApiError::from_update_inputs_error(e, &state.errors))?;
    Ok(StatusCode::NO_CONTENT)
}
