//! Form lifecycle: create, read, rename, delete.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use ticketdash_domain::model::{Form, FormField, FormId};
use ticketdash_domain::validation::check_title;
use ticketdash_domain::{CustomIdGenerator, DomainError, ValidationError};
use ticketdash_storage::{FormStore, StorageError};

use super::{check_ownership, Caller, Ownership};
use crate::adapters::{fields_from_stored, form_from_stored};
use crate::audit::{AuditActionType, AuditEntry, AuditResourceType, AuditSink};

/// Errors from form lifecycle operations.
#[derive(Debug, Error)]
pub enum FormsError {
    #[error("Form #{form_id} not found")]
    NotFound { form_id: FormId },

    #[error("Form #{form_id} belongs to another guild")]
    Forbidden { form_id: FormId },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type FormsResult<T> = Result<T, FormsError>;

/// A form together with its current inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormDetails {
    #[serde(flatten)]
    pub form: Form,
    pub inputs: Vec<FormField>,
}

/// Handles form-level requests.
pub struct FormsHandler<S: FormStore> {
    store: Arc<S>,
    ids: Arc<dyn CustomIdGenerator>,
    audit: Arc<dyn AuditSink>,
}

impl<S: FormStore> FormsHandler<S> {
    pub fn new(store: Arc<S>, ids: Arc<dyn CustomIdGenerator>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, ids, audit }
    }

    /// Creates a form owned by the caller's guild.
    #[instrument(skip(self, title), fields(guild_id = caller.guild_id))]
    pub async fn create(&self, caller: Caller, title: &str) -> FormsResult<Form> {
        let title = check_title(title)?;
        let custom_id = self.ids.generate()?;

        let form = form_from_stored(
            self.store
                .create_form(caller.guild_id, &title, &custom_id)
                .await?,
        );
        info!(form_id = form.id, "form created");

        self.audit.record(
            AuditEntry::new(
                caller.guild_id,
                caller.user_id,
                AuditActionType::FormCreate,
                AuditResourceType::Form,
            )
            .resource_id(form.id)
            .new_data(&form),
        );
        Ok(form)
    }

    /// Returns a form with its inputs sorted by position.
    #[instrument(skip(self), fields(guild_id = caller.guild_id))]
    pub async fn get(&self, caller: Caller, form_id: FormId) -> FormsResult<FormDetails> {
        let form = self.owned_form(&caller, form_id).await?;
        let inputs = fields_from_stored(self.store.list_fields(form_id).await?)?;
        Ok(FormDetails { form, inputs })
    }

    /// Changes a form's title.
    #[instrument(skip(self, title), fields(guild_id = caller.guild_id))]
    pub async fn rename(&self, caller: Caller, form_id: FormId, title: &str) -> FormsResult<Form> {
        let before = self.owned_form(&caller, form_id).await?;
        let title = check_title(title)?;

        self.store.update_form_title(form_id, &title).await?;
        let after = Form {
            title,
            ..before.clone()
        };
        info!(form_id, "form renamed");

        self.audit.record(
            AuditEntry::new(
                caller.guild_id,
                caller.user_id,
                AuditActionType::FormUpdate,
                AuditResourceType::Form,
            )
            .resource_id(form_id)
            .old_data(&before)
            .new_data(&after),
        );
        Ok(after)
    }

    /// Deletes a form along with its inputs and options.
    #[instrument(skip(self), fields(guild_id = caller.guild_id))]
    pub async fn delete(&self, caller: Caller, form_id: FormId) -> FormsResult<()> {
        let before = self.owned_form(&caller, form_id).await?;

        self.store.delete_form(form_id).await?;
        info!(form_id, "form deleted");

        self.audit.record(
            AuditEntry::new(
                caller.guild_id,
                caller.user_id,
                AuditActionType::FormDelete,
                AuditResourceType::Form,
            )
            .resource_id(form_id)
            .old_data(&before),
        );
        Ok(())
    }

    async fn owned_form(&self, caller: &Caller, form_id: FormId) -> FormsResult<Form> {
        match check_ownership(self.store.as_ref(), caller, form_id).await? {
            Ownership::Owned(form) => Ok(form_from_stored(form)),
            Ownership::Missing => Err(FormsError::NotFound { form_id }),
            Ownership::OtherGuild => Err(FormsError::Forbidden { form_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::StoreAuditSink;
    use ticketdash_domain::RandomCustomIds;
    use ticketdash_storage::MemoryFormStore;

    const GUILD: u64 = 100;

    fn handler(store: &Arc<MemoryFormStore>) -> FormsHandler<MemoryFormStore> {
        FormsHandler::new(
            Arc::clone(store),
            Arc::new(RandomCustomIds::new()),
            Arc::new(StoreAuditSink::new(Arc::clone(store))),
        )
    }

    #[tokio::test]
    async fn test_create_trims_title_and_assigns_custom_id() {
        let store = MemoryFormStore::new_shared();
        let form = handler(&store)
            .create(Caller::new(GUILD, 1), "  Support  ")
            .await
            .unwrap();

        assert_eq!(form.title, "Support");
        assert_eq!(form.guild_id, GUILD);
        assert_eq!(form.custom_id.len(), ticketdash_domain::CUSTOM_ID_LENGTH);
        assert!(store.get_form(form.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let store = MemoryFormStore::new_shared();
        let err = handler(&store)
            .create(Caller::new(GUILD, 1), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, FormsError::Invalid(ValidationError::InvalidTitle { .. })));
    }

    #[tokio::test]
    async fn test_other_guild_is_forbidden_and_missing_is_not_found() {
        let store = MemoryFormStore::new_shared();
        let handler = handler(&store);
        let form = handler.create(Caller::new(GUILD, 1), "Mine").await.unwrap();

        let err = handler.get(Caller::new(GUILD + 1, 1), form.id).await.unwrap_err();
        assert!(matches!(err, FormsError::Forbidden { .. }));

        let err = handler.delete(Caller::new(GUILD, 1), 9999).await.unwrap_err();
        assert!(matches!(err, FormsError::NotFound { form_id: 9999 }));
    }

    #[tokio::test]
    async fn test_rename_and_delete_are_audited() {
        let store = MemoryFormStore::new_shared();
        let handler = handler(&store);
        let caller = Caller::new(GUILD, 7);
        let form = handler.create(caller, "Old").await.unwrap();

        let renamed = handler.rename(caller, form.id, "New").await.unwrap();
        assert_eq!(renamed.title, "New");
        assert_eq!(handler.get(caller, form.id).await.unwrap().form.title, "New");

        handler.delete(caller, form.id).await.unwrap();
        assert!(store.get_form(form.id).await.unwrap().is_none());

        // Audit writes are spawned; give them a chance to land.
        for _ in 0..50 {
            if store.list_audit_entries(GUILD, 10).await.unwrap().len() == 3 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let actions: Vec<String> = store
            .list_audit_entries(GUILD, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.action_type)
            .collect();
        assert_eq!(actions, vec!["form_delete", "form_update", "form_create"]);
    }
}
