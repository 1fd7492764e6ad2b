//! Error and outcome types for input reconciliation.

use thiserror::Error;

use ticketdash_domain::model::FormId;
use ticketdash_domain::{DomainError, ValidationError};
use ticketdash_storage::StorageError;

/// Errors that can occur while reconciling a form's inputs.
#[derive(Debug, Error)]
pub enum UpdateInputsError {
    /// The form does not exist.
    #[error("Form #{form_id} not found")]
    NotFound { form_id: FormId },

    /// The form belongs to another guild.
    #[error("Form #{form_id} belongs to another guild")]
    Forbidden { form_id: FormId },

    /// The request violates a field or batch rule. Nothing was written.
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// Reading or writing the store failed. The transaction was rolled back.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Planning failed, typically while generating a custom id.
    #[error(transparent)]
    Planning(#[from] DomainError),
}

impl UpdateInputsError {
    /// Outcome label recorded in metrics.
    pub fn outcome(&self) -> ReconcileOutcome {
        match self {
            UpdateInputsError::NotFound { .. } => ReconcileOutcome::NotFound,
            UpdateInputsError::Forbidden { .. } => ReconcileOutcome::Forbidden,
            UpdateInputsError::Rejected(_) => ReconcileOutcome::Rejected,
            UpdateInputsError::Storage(_) | UpdateInputsError::Planning(_) => {
                ReconcileOutcome::Aborted
            }
        }
    }
}

/// Result type for input reconciliation.
pub type UpdateInputsResult<T> = Result<T, UpdateInputsError>;

/// How a reconciliation request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Committed,
    Rejected,
    NotFound,
    Forbidden,
    Aborted,
}

impl ReconcileOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            ReconcileOutcome::Committed => "committed",
            ReconcileOutcome::Rejected => "rejected",
            ReconcileOutcome::NotFound => "not_found",
            ReconcileOutcome::Forbidden => "forbidden",
            ReconcileOutcome::Aborted => "aborted",
        }
    }
}
