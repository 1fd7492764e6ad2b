//! Reconciliation planning.
//!
//! Turns a [`ValidatedBatch`] into the ordered list of storage operations
//! that brings a form's fields to the requested state:
//!
//! 1. Deletes, in request order (each cascades to the field's options).
//! 2. Updates, in request order. The custom id is carried over from the
//!    existing field. Each update of an option-bearing field, or of a field
//!    that had options before, is followed by a [`PlannedOperation::ReplaceOptions`].
//! 3. Creates, in request order, each with a freshly generated custom id and
//!    its option list.
//!
//! Length bounds on updates and creates are the effective values from
//! [`crate::constraints::effective_bounds`].

use tracing::debug;

use crate::constraints::{effective_bounds, LengthBounds};
use crate::custom_id::CustomIdGenerator;
use crate::error::{DomainError, DomainResult};
use crate::model::{FieldId, FieldSpec, FieldType, FormId, OptionSpec, TextStyle};
use crate::validation::ValidatedBatch;

/// Field row contents to write, for either an update or a create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedField {
    pub custom_id: String,
    pub field_type: FieldType,
    pub position: u8,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub style: Option<TextStyle>,
    pub required: bool,
    pub bounds: LengthBounds,
}

/// Option row contents to write. `position` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOption {
    pub position: u8,
    pub label: String,
    pub description: Option<String>,
    pub value: String,
}

/// A single storage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedOperation {
    /// Remove a field together with its options.
    DeleteField { field_id: FieldId },
    /// Overwrite an existing field row; id and custom id are unchanged.
    UpdateField {
        field_id: FieldId,
        field: PlannedField,
    },
    /// Delete every option of the field, then insert `options`.
    ReplaceOptions {
        field_id: FieldId,
        options: Vec<PlannedOption>,
    },
    /// Insert a field row, then its options.
    CreateField {
        field: PlannedField,
        options: Vec<PlannedOption>,
    },
}

/// Ordered operations for one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub form_id: FormId,
    pub operations: Vec<PlannedOperation>,
}

impl ReconciliationPlan {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Builds [`ReconciliationPlan`]s, drawing custom ids for new fields from `G`.
#[derive(Debug, Clone)]
pub struct ReconciliationPlanner<G> {
    ids: G,
}

impl<G: CustomIdGenerator> ReconciliationPlanner<G> {
    pub fn new(ids: G) -> Self {
        Self { ids }
    }

    /// Plans the batch. Fails only if custom id generation fails, or if the
    /// batch refers to a field missing from its own existing set.
    pub fn plan(&self, batch: &ValidatedBatch<'_>) -> DomainResult<ReconciliationPlan> {
        let mut operations = Vec::with_capacity(
            batch.deletes().len() + 2 * batch.updates().len() + batch.creates().len(),
        );

        operations.extend(
            batch
                .deletes()
                .iter()
                .map(|&field_id| PlannedOperation::DeleteField { field_id }),
        );

        for update in batch.updates() {
            let existing = batch
                .existing_field(update.id)
                .ok_or(DomainError::PlanInconsistent {
                    field_id: update.id,
                })?;

            operations.push(PlannedOperation::UpdateField {
                field_id: update.id,
                field: planned_field(existing.custom_id.clone(), &update.spec),
            });

            if update.spec.field_type.has_options() || !existing.options.is_empty() {
                operations.push(PlannedOperation::ReplaceOptions {
                    field_id: update.id,
                    options: planned_options(&update.spec),
                });
            }
        }

        for spec in batch.creates() {
            let custom_id = self.ids.generate()?;
            operations.push(PlannedOperation::CreateField {
                field: planned_field(custom_id, spec),
                options: planned_options(spec),
            });
        }

        debug!(
            form_id = batch.form_id(),
            operations = operations.len(),
            "planned reconciliation"
        );

        Ok(ReconciliationPlan {
            form_id: batch.form_id(),
            operations,
        })
    }
}

fn planned_field(custom_id: String, spec: &FieldSpec) -> PlannedField {
    let requested = LengthBounds::new(spec.min_length, spec.max_length);
    PlannedField {
        custom_id,
        field_type: spec.field_type,
        position: spec.position,
        label: spec.label.clone(),
        description: spec.description.clone(),
        placeholder: spec.placeholder.clone(),
        style: spec.style,
        required: spec.required,
        bounds: effective_bounds(spec.field_type, requested, spec.options().len()),
    }
}

/// Options are only persisted for option-bearing types.
fn planned_options(spec: &FieldSpec) -> Vec<PlannedOption> {
    if !spec.field_type.has_options() {
        return Vec::new();
    }
    spec.options()
        .iter()
        .zip(1u8..)
        .map(|(option, position): (&OptionSpec, u8)| PlannedOption {
            position,
            label: option.label.clone(),
            description: option.description.clone(),
            value: option.value.clone(),
        })
        .collect()
}
