//! Storage error types.

use std::time::Duration;

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Form not found.
    #[error("form not found: {form_id}")]
    FormNotFound { form_id: i32 },

    /// A write targeted a row that no longer exists.
    #[error("storage conflict: {message}")]
    Conflict { message: String },

    /// Database connection error.
    #[error("database connection error: {message}")]
    ConnectionError { message: String },

    /// Database query error.
    #[error("database query error: {message}")]
    QueryError { message: String },

    /// Query exceeded its timeout.
    #[error("{operation} timed out after {timeout:?}")]
    QueryTimeout { operation: String, timeout: Duration },

    /// Transaction error.
    #[error("transaction error: {message}")]
    TransactionError { message: String },

    /// Serialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },

    /// Health check failed.
    #[error("health check failed: {message}")]
    HealthCheckFailed { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a successful health check.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency: Duration,
    pub message: Option<String>,
}
