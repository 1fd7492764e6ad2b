//! Domain error types for reconciliation planning.

use thiserror::Error;

use crate::model::FieldId;

/// Errors raised while planning a reconciliation.
///
/// Validation failures are reported separately through
/// [`crate::validation::ValidationError`]; these are internal failures that
/// map to a 500-class response.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The random source failed while generating a custom id.
    #[error("failed to generate custom id: {message}")]
    IdGeneration { message: String },

    /// A validated batch referenced a field missing from the existing set.
    #[error("reconciliation plan references unknown field {field_id}")]
    PlanInconsistent { field_id: FieldId },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
