//! Input reconciliation handler implementation.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use ticketdash_domain::model::{FormField, FormId, InputsUpdate};
use ticketdash_domain::reconcile::ReconciliationPlanner;
use ticketdash_domain::validation::{check_shape, BatchValidator};
use ticketdash_domain::CustomIdGenerator;
use ticketdash_storage::FormStore;

use super::applier::TransactionalApplier;
use super::types::{ReconcileOutcome, UpdateInputsError, UpdateInputsResult};
use crate::adapters::fields_from_stored;
use crate::audit::{AuditActionType, AuditEntry, AuditResourceType, AuditSink};
use crate::handlers::{check_ownership, Caller, Ownership};

/// Handler for `PATCH /forms/{form_id}/inputs`.
///
/// Validation is stateless and planning only needs an id source, so one
/// handler serves every form; the store transaction is the only per-request
/// resource.
pub struct UpdateInputsHandler<S: FormStore> {
    store: Arc<S>,
    validator: BatchValidator,
    planner: ReconciliationPlanner<Arc<dyn CustomIdGenerator>>,
    applier: TransactionalApplier<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S: FormStore> UpdateInputsHandler<S> {
    pub fn new(store: Arc<S>, ids: Arc<dyn CustomIdGenerator>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            applier: TransactionalApplier::new(Arc::clone(&store)),
            store,
            validator: BatchValidator::new(),
            planner: ReconciliationPlanner::new(ids),
            audit,
        }
    }

    /// Reconciles the form's inputs with `request`.
    ///
    /// Succeeds only if every change was committed; on any error the form's
    /// inputs are exactly as they were before the call.
    #[instrument(
        skip(self, request),
        fields(guild_id = caller.guild_id, user_id = caller.user_id)
    )]
    pub async fn handle(
        &self,
        caller: Caller,
        form_id: FormId,
        request: InputsUpdate,
    ) -> UpdateInputsResult<()> {
        let started = Instant::now();
        info!(
            stage = "received",
            form_id,
            creates = request.creates.len(),
            updates = request.updates.len(),
            deletes = request.deletes.len(),
            "inputs update received"
        );

        let result = self.reconcile(&caller, form_id, &request).await;

        let outcome = match &result {
            Ok(_) => ReconcileOutcome::Committed,
            Err(e) => e.outcome(),
        };
        metrics::counter!(
            "ticketdash_inputs_reconciliations_total",
            "outcome" => outcome.as_str()
        )
        .increment(1);
        metrics::histogram!("ticketdash_inputs_reconciliation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let existing = result?;
        self.audit.record(
            AuditEntry::new(
                caller.guild_id,
                caller.user_id,
                AuditActionType::FormInputsUpdate,
                AuditResourceType::FormInput,
            )
            .resource_id(form_id)
            .old_data(&existing)
            .new_data(&request)
            .metadata(serde_json::json!({
                "created": request.creates.len(),
                "updated": request.updates.len(),
                "deleted": request.deletes.len(),
            })),
        );
        Ok(())
    }

    /// Runs the pipeline, returning the field set as it was before the
    /// change.
    async fn reconcile(
        &self,
        caller: &Caller,
        form_id: FormId,
        request: &InputsUpdate,
    ) -> UpdateInputsResult<Vec<FormField>> {
        match check_ownership(self.store.as_ref(), caller, form_id).await? {
            Ownership::Owned(_) => {}
            Ownership::Missing => return Err(UpdateInputsError::NotFound { form_id }),
            Ownership::OtherGuild => {
                warn!(form_id, "inputs update for another guild's form");
                return Err(UpdateInputsError::Forbidden { form_id });
            }
        }

        let existing = fields_from_stored(self.store.list_fields(form_id).await?)?;

        debug!(stage = "validating", form_id, existing = existing.len());
        let validated = check_shape(request)
            .and_then(|()| self.validator.validate(form_id, &existing, request));
        let batch = match validated {
            Ok(batch) => batch,
            Err(e) => {
                info!(stage = "rejected", form_id, reason = %e, "inputs update rejected");
                return Err(e.into());
            }
        };

        let plan = self.planner.plan(&batch)?;
        debug!(stage = "planned", form_id, operations = plan.len());

        debug!(stage = "applying", form_id);
        if let Err(e) = self.applier.apply(&plan).await {
            warn!(stage = "aborted", form_id, error = %e, "inputs update rolled back");
            return Err(e.into());
        }
        info!(stage = "committed", form_id, operations = plan.len(), "inputs updated");

        Ok(existing)
    }
}
