//! Application state for HTTP handlers.

use std::sync::Arc;

use ticketdash_domain::{CustomIdGenerator, RandomCustomIds};
use ticketdash_server::{AuditSink, FormsHandler, StoreAuditSink, UpdateInputsHandler};
use ticketdash_storage::FormStore;

use crate::errors::ErrorConfig;

/// Application state shared across all HTTP handlers.
///
/// Both handlers share one store, one custom id source and one audit sink.
pub struct AppState<S: FormStore> {
    /// The storage backend, used directly for readiness checks.
    pub storage: Arc<S>,
    pub forms: FormsHandler<S>,
    pub inputs: UpdateInputsHandler<S>,
    /// Controls how much internal detail error responses carry.
    pub errors: ErrorConfig,
}

impl<S: FormStore> AppState<S> {
    /// Creates state that audits to the same store and hides internal
    /// error details.
    pub fn new(storage: Arc<S>) -> Self {
        let audit = Arc::new(StoreAuditSink::new(Arc::clone(&storage)));
        Self::with_components(
            storage,
            Arc::new(RandomCustomIds::new()),
            audit,
            ErrorConfig::production(),
        )
    }

    pub fn with_components(
        storage: Arc<S>,
        ids: Arc<dyn CustomIdGenerator>,
        audit: Arc<dyn AuditSink>,
        errors: ErrorConfig,
    ) -> Self {
        Self {
            forms: FormsHandler::new(Arc::clone(&storage), Arc::clone(&ids), Arc::clone(&audit)),
            inputs: UpdateInputsHandler::new(Arc::clone(&storage), ids, audit),
            storage,
            errors,
        }
    }
}
