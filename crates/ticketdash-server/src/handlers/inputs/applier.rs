//! Executes a reconciliation plan inside a single store transaction.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use ticketdash_domain::model::FormId;
use ticketdash_domain::reconcile::{PlannedOperation, ReconciliationPlan};
use ticketdash_storage::{FormStore, FormTransaction, StorageResult};

use crate::adapters::{new_field, new_option, stored_field};

/// Applies plans atomically: either every operation commits or none does.
///
/// The applier trusts the plan; it performs no validation of its own.
pub struct TransactionalApplier<S: FormStore> {
    store: Arc<S>,
}

impl<S: FormStore> TransactionalApplier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Runs every operation of `plan` in order and commits.
    ///
    /// On the first failure the transaction is rolled back and the error
    /// returned.
    #[instrument(skip(self, plan), fields(form_id = plan.form_id, operations = plan.len()))]
    pub async fn apply(&self, plan: &ReconciliationPlan) -> StorageResult<()> {
        let mut tx = self.store.begin().await?;

        for (index, operation) in plan.operations.iter().enumerate() {
            if let Err(e) = apply_operation(tx.as_mut(), plan.form_id, operation).await {
                error!(index, error = %e, "operation failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        }

        tx.commit().await
    }
}

async fn apply_operation(
    tx: &mut dyn FormTransaction,
    form_id: FormId,
    operation: &PlannedOperation,
) -> StorageResult<()> {
    match operation {
        PlannedOperation::DeleteField { field_id } => {
            debug!(field_id, "deleting input");
            tx.delete_field(form_id, *field_id).await
        }
        PlannedOperation::UpdateField { field_id, field } => {
            debug!(field_id, position = field.position, "updating input");
            tx.update_field(&stored_field(form_id, *field_id, field)).await
        }
        PlannedOperation::ReplaceOptions { field_id, options } => {
            debug!(field_id, options = options.len(), "replacing options");
            for existing in tx.list_options(*field_id).await? {
                tx.delete_option(existing.id).await?;
            }
            for option in options {
                tx.create_option(&new_option(*field_id, option)).await?;
            }
            Ok(())
        }
        PlannedOperation::CreateField { field, options } => {
            let field_id = tx.create_field(&new_field(form_id, field)).await?;
            debug!(field_id, position = field.position, "created input");
            for option in options {
                tx.create_option(&new_option(field_id, option)).await?;
            }
            Ok(())
        }
    }
}
