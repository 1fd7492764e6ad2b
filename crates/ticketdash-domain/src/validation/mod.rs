//! Reconciliation request validation.
//!
//! Validation happens in two passes:
//! - [`check_shape`] enforces per-field limits (label length, position range,
//!   option sizes) and reports every violation at once.
//! - [`BatchValidator`] checks the request against the form's current fields.
//!   Its checks run in a fixed order and stop at the first failure, so the
//!   message always names the first violated rule.

mod shape;

use std::collections::HashSet;

use thiserror::Error;

use crate::constraints::check_options;
use crate::model::{FieldId, FieldSpec, FieldType, FieldUpdate, FormField, FormId, InputsUpdate};

pub use shape::{check_shape, check_title, FieldViolation, MAX_TITLE_LENGTH};

/// Smallest number of inputs a form may have.
pub const MIN_FIELDS: usize = 1;

/// Largest number of inputs a form may have.
pub const MAX_FIELDS: usize = 5;

/// A rejected request. Every variant maps to a 400-class response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Your input contained the following errors:\n{}", format_violations(.violations))]
    InvalidShape { violations: Vec<FieldViolation> },

    #[error("Forms must have between {MIN_FIELDS} and {MAX_FIELDS} inputs (current: {count} inputs)")]
    FieldCount { count: usize },

    #[error("Input #{field_id} (to be updated) not found in form #{form_id}")]
    UpdateTargetNotFound { field_id: FieldId, form_id: FormId },

    #[error("Input #{field_id} (to be deleted) not found in form #{form_id}")]
    DeleteTargetNotFound { field_id: FieldId, form_id: FormId },

    #[error("Input #{field_id} appears more than once in the update array")]
    DuplicateUpdate { field_id: FieldId },

    #[error("Input #{field_id} appears more than once in the delete array")]
    DuplicateDelete { field_id: FieldId },

    #[error("Input #{field_id} cannot be both deleted and updated")]
    UpdateDeleteOverlap { field_id: FieldId },

    #[error("All {expected} existing inputs must be included in the update array (found {found})")]
    UpdateCountMismatch { expected: usize, found: usize },

    #[error("Input #{field_id} must be included in the update array")]
    MissingFromUpdate { field_id: FieldId },

    #[error("Input positions must be unique and in ascending order (1, 2, 3, etc.)")]
    InvalidPositions,

    #[error("{field_type} inputs must have at least {}", option_count(.min))]
    TooFewOptions { field_type: FieldType, min: usize },

    #[error("{field_type} inputs can have at most {max} options")]
    TooManyOptions { field_type: FieldType, max: usize },

    #[error("Duplicate option values detected: {}. Each option must have a unique value", .values.join(", "))]
    DuplicateOptionValues { values: Vec<String> },

    #[error("{field_type} inputs do not support options")]
    OptionsNotSupported { field_type: FieldType },

    #[error("{message}")]
    InvalidTitle { message: String },
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn option_count(n: &usize) -> String {
    match n {
        1 => "one option".to_string(),
        n => format!("{n} options"),
    }
}

/// A request that passed every batch check, paired with the fields it was
/// checked against.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedBatch<'a> {
    form_id: FormId,
    existing: &'a [FormField],
    request: &'a InputsUpdate,
}

impl<'a> ValidatedBatch<'a> {
    pub fn form_id(&self) -> FormId {
        self.form_id
    }

    pub fn existing(&self) -> &'a [FormField] {
        self.existing
    }

    pub fn creates(&self) -> &'a [FieldSpec] {
        &self.request.creates
    }

    pub fn updates(&self) -> &'a [FieldUpdate] {
        &self.request.updates
    }

    pub fn deletes(&self) -> &'a [FieldId] {
        &self.request.deletes
    }

    /// Looks up a field of the form as it was when validated.
    pub fn existing_field(&self, field_id: FieldId) -> Option<&'a FormField> {
        self.existing.iter().find(|f| f.id == field_id)
    }
}

/// Checks a reconciliation request against a form's current fields.
///
/// Stateless; one validator may be shared across requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchValidator;

impl BatchValidator {
    pub fn new() -> Self {
        Self
    }

    /// Runs every batch check in order, returning the first failure.
    pub fn validate<'a>(
        &self,
        form_id: FormId,
        existing: &'a [FormField],
        request: &'a InputsUpdate,
    ) -> Result<ValidatedBatch<'a>, ValidationError> {
        check_field_count(request)?;
        check_targets_exist(form_id, existing, request)?;
        check_disjoint(request)?;
        check_exhaustive(existing, request)?;
        check_positions(request)?;
        check_all_options(request)?;

        Ok(ValidatedBatch {
            form_id,
            existing,
            request,
        })
    }
}

fn check_field_count(request: &InputsUpdate) -> Result<(), ValidationError> {
    let count = request.resulting_field_count();
    if (MIN_FIELDS..=MAX_FIELDS).contains(&count) {
        Ok(())
    } else {
        Err(ValidationError::FieldCount { count })
    }
}

fn check_targets_exist(
    form_id: FormId,
    existing: &[FormField],
    request: &InputsUpdate,
) -> Result<(), ValidationError> {
    let existing_ids: HashSet<FieldId> = existing.iter().map(|f| f.id).collect();

    let mut seen = HashSet::new();
    for update in &request.updates {
        if !existing_ids.contains(&update.id) {
            return Err(ValidationError::UpdateTargetNotFound {
                field_id: update.id,
                form_id,
            });
        }
        if !seen.insert(update.id) {
            return Err(ValidationError::DuplicateUpdate { field_id: update.id });
        }
    }

    let mut seen = HashSet::new();
    for &field_id in &request.deletes {
        if !existing_ids.contains(&field_id) {
            return Err(ValidationError::DeleteTargetNotFound { field_id, form_id });
        }
        if !seen.insert(field_id) {
            return Err(ValidationError::DuplicateDelete { field_id });
        }
    }

    Ok(())
}

fn check_disjoint(request: &InputsUpdate) -> Result<(), ValidationError> {
    let updated: HashSet<FieldId> = request.updates.iter().map(|u| u.id).collect();
    match request.deletes.iter().find(|id| updated.contains(id)) {
        Some(&field_id) => Err(ValidationError::UpdateDeleteOverlap { field_id }),
        None => Ok(()),
    }
}

fn check_exhaustive(existing: &[FormField], request: &InputsUpdate) -> Result<(), ValidationError> {
    let deleted: HashSet<FieldId> = request.deletes.iter().copied().collect();
    let remaining: Vec<FieldId> = existing
        .iter()
        .map(|f| f.id)
        .filter(|id| !deleted.contains(id))
        .collect();

    if remaining.len() != request.updates.len() {
        return Err(ValidationError::UpdateCountMismatch {
            expected: remaining.len(),
            found: request.updates.len(),
        });
    }

    let updated: HashSet<FieldId> = request.updates.iter().map(|u| u.id).collect();
    match remaining.into_iter().find(|id| !updated.contains(id)) {
        Some(field_id) => Err(ValidationError::MissingFromUpdate { field_id }),
        None => Ok(()),
    }
}

/// Positions across creates and updates must be exactly `1..=N`.
fn check_positions(request: &InputsUpdate) -> Result<(), ValidationError> {
    let mut positions: Vec<u8> = request
        .creates
        .iter()
        .map(|c| c.position)
        .chain(request.updates.iter().map(|u| u.spec.position))
        .collect();
    positions.sort_unstable();

    let is_permutation = positions
        .iter()
        .enumerate()
        .all(|(i, &position)| usize::from(position) == i + 1);

    if is_permutation {
        Ok(())
    } else {
        Err(ValidationError::InvalidPositions)
    }
}

fn check_all_options(request: &InputsUpdate) -> Result<(), ValidationError> {
    request
        .creates
        .iter()
        .chain(request.updates.iter().map(|u| &u.spec))
        .try_for_each(|spec| check_options(spec.field_type, spec.options()))
}
