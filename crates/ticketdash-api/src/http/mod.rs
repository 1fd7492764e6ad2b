//! HTTP REST API endpoints.
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/forms` | POST | Create form |
//! | `/forms/{form_id}` | GET | Form with its inputs |
//! | `/forms/{form_id}` | PATCH | Rename form |
//! | `/forms/{form_id}` | DELETE | Delete form |
//! | `/forms/{form_id}/inputs` | PATCH | Reconcile inputs |
//! | `/health` | GET | Liveness |
//! | `/ready` | GET | Readiness (storage health) |
//! | `/metrics` | GET | Prometheus metrics (path configurable) |
//!
//! Form routes require the `x-guild-id` and `x-user-id` headers.

pub mod routes;
pub mod state;

pub use routes::{
    apply_middleware, create_router, create_router_with_body_limit,
    create_router_with_observability, DeferredJson, JsonBadRequest, DEFAULT_BODY_LIMIT,
};
pub use state::AppState;
