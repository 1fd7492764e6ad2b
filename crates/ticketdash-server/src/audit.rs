//! Audit logging of form changes.
//!
//! Entries are written in the background; a failed or slow write is logged
//! and never affects the request that produced it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ticketdash_storage::{FormStore, NewAuditEntry};

/// Default bound on a single audit write.
pub const DEFAULT_AUDIT_TIMEOUT: Duration = Duration::from_secs(5);

/// The kind of change being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditActionType {
    FormCreate,
    FormUpdate,
    FormDelete,
    FormInputsUpdate,
}

impl AuditActionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            AuditActionType::FormCreate => "form_create",
            AuditActionType::FormUpdate => "form_update",
            AuditActionType::FormDelete => "form_delete",
            AuditActionType::FormInputsUpdate => "form_inputs_update",
        }
    }
}

impl fmt::Display for AuditActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of resource that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditResourceType {
    Form,
    FormInput,
}

impl AuditResourceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            AuditResourceType::Form => "form",
            AuditResourceType::FormInput => "form_input",
        }
    }
}

/// One audit record, with its payloads already serialised.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub guild_id: Option<u64>,
    pub user_id: u64,
    pub action_type: AuditActionType,
    pub resource_type: AuditResourceType,
    pub resource_id: Option<String>,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(
        guild_id: u64,
        user_id: u64,
        action_type: AuditActionType,
        resource_type: AuditResourceType,
    ) -> Self {
        Self {
            guild_id: Some(guild_id),
            user_id,
            action_type,
            resource_type,
            resource_id: None,
            old_data: None,
            new_data: None,
            metadata: None,
        }
    }

    pub fn resource_id(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    /// Attaches the state before the change. Serialisation failures are
    /// logged and leave the payload empty.
    pub fn old_data<T: Serialize>(mut self, data: &T) -> Self {
        self.old_data = to_payload(self.action_type, "old_data", data);
        self
    }

    /// Attaches the state after the change.
    pub fn new_data<T: Serialize>(mut self, data: &T) -> Self {
        self.new_data = to_payload(self.action_type, "new_data", data);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn into_record(self) -> NewAuditEntry {
        NewAuditEntry {
            guild_id: self.guild_id,
            user_id: self.user_id,
            action_type: self.action_type.as_str().to_string(),
            resource_type: self.resource_type.as_str().to_string(),
            resource_id: self.resource_id,
            old_data: self.old_data,
            new_data: self.new_data,
            metadata: self.metadata,
        }
    }
}

fn to_payload<T: Serialize>(
    action: AuditActionType,
    field: &'static str,
    data: &T,
) -> Option<serde_json::Value> {
    match serde_json::to_value(data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(action = %action, field, error = %e, "failed to serialise audit payload");
            None
        }
    }
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync + 'static {
    /// Records an entry without waiting for it to be written. Returns the
    /// background task, if one was started.
    fn record(&self, entry: AuditEntry) -> Option<JoinHandle<()>>;
}

/// Writes entries to the form store from a spawned task.
pub struct StoreAuditSink<S: FormStore> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S: FormStore> StoreAuditSink<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_timeout(store, DEFAULT_AUDIT_TIMEOUT)
    }

    pub fn with_timeout(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }
}

impl<S: FormStore> AuditSink for StoreAuditSink<S> {
    fn record(&self, entry: AuditEntry) -> Option<JoinHandle<()>> {
        let store = Arc::clone(&self.store);
        let timeout = self.timeout;
        let action = entry.action_type;

        Some(tokio::spawn(async move {
            match tokio::time::timeout(timeout, store.insert_audit_entry(entry.into_record())).await
            {
                Ok(Ok(())) => debug!(action = %action, "audit entry recorded"),
                Ok(Err(e)) => warn!(action = %action, error = %e, "failed to record audit entry"),
                Err(_) => warn!(
                    action = %action,
                    timeout_ms = timeout.as_millis() as u64,
                    "timed out recording audit entry"
                ),
            }
        }))
    }
}

/// Discards every entry. Used when auditing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, entry: AuditEntry) -> Option<JoinHandle<()>> {
        debug!(action = %entry.action_type, "audit disabled, entry dropped");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketdash_storage::MemoryFormStore;

    #[tokio::test]
    async fn test_store_sink_writes_entry() {
        let store = MemoryFormStore::new_shared();
        let sink = StoreAuditSink::new(Arc::clone(&store));

        let entry = AuditEntry::new(10, 20, AuditActionType::FormUpdate, AuditResourceType::Form)
            .resource_id(3)
            .old_data(&serde_json::json!({"title": "Old"}))
            .new_data(&serde_json::json!({"title": "New"}));
        sink.record(entry).unwrap().await.unwrap();

        let entries = store.list_audit_entries(10, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, "form_update");
        assert_eq!(entries[0].resource_type, "form");
        assert_eq!(entries[0].resource_id.as_deref(), Some("3"));
        assert_eq!(entries[0].user_id, 20);
    }

    #[tokio::test]
    async fn test_noop_sink_spawns_nothing() {
        let entry = AuditEntry::new(1, 2, AuditActionType::FormDelete, AuditResourceType::Form);
        assert!(NoopAuditSink.record(entry).is_none());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(AuditActionType::FormInputsUpdate.as_str(), "form_inputs_update");
        assert_eq!(AuditResourceType::FormInput.as_str(), "form_input");
    }
}
