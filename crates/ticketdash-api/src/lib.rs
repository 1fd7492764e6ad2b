//! ticketdash-api: HTTP API layer
//!
//! This crate provides the API layer including:
//! - HTTP REST endpoints via Axum
//! - Middleware (request id, logging, metrics, caller context)
//! - Error responses and observability setup
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               ticketdash-api                │
//! ├─────────────────────────────────────────────┤
//! │  http/          - HTTP REST endpoints       │
//! │  middleware/    - Request id, logging, ...  │
//! │  errors.rs      - Error responses           │
//! │  observability/ - Logging and metrics       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod errors;
pub mod http;
pub mod middleware;
pub mod observability;
