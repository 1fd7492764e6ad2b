//! ticketdash-server: Request handlers and business logic
//!
//! This crate contains the business logic layer including:
//! - Form handler for create, read, rename and delete
//! - Inputs handler reconciling a form's field set in one transaction
//! - Audit sink writing change records in the background
//! - Configuration management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              ticketdash-server              │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  audit.rs    - Background audit writes      │
//! │  adapters.rs - Storage <-> domain records   │
//! │  handlers/   - Request handlers             │
//! │    forms.rs   - Form lifecycle              │
//! │    inputs/    - Field-set reconciliation    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod audit;
pub mod config;
pub mod handlers;

// Re-exports for convenience
pub use audit::{AuditSink, NoopAuditSink, StoreAuditSink};
pub use config::{ConfigLoadError, ServerConfig};
pub use handlers::{
    Caller, FormDetails, FormsError, FormsHandler, UpdateInputsError, UpdateInputsHandler,
};
