//! FormStore and FormTransaction trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HealthStatus, StorageResult};

/// A stored form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredForm {
    pub id: i32,
    pub guild_id: u64,
    pub title: String,
    pub custom_id: String,
}

/// A stored form input. `field_type` and `style` hold wire codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredField {
    pub id: i32,
    pub form_id: i32,
    pub field_type: u8,
    pub position: u8,
    pub custom_id: String,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub style: Option<u8>,
    pub required: bool,
    pub min_length: Option<u16>,
    pub max_length: Option<u16>,
}

/// A form input to insert; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewField {
    pub form_id: i32,
    pub field_type: u8,
    pub position: u8,
    pub custom_id: String,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub style: Option<u8>,
    pub required: bool,
    pub min_length: Option<u16>,
    pub max_length: Option<u16>,
}

impl NewField {
    /// Attaches the id assigned by the store.
    pub fn into_stored(self, id: i32) -> StoredField {
        StoredField {
            id,
            form_id: self.form_id,
            field_type: self.field_type,
            position: self.position,
            custom_id: self.custom_id,
            label: self.label,
            description: self.description,
            placeholder: self.placeholder,
            style: self.style,
            required: self.required,
            min_length: self.min_length,
            max_length: self.max_length,
        }
    }
}

/// A stored option of a choice-type input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOption {
    pub id: i32,
    pub field_id: i32,
    pub position: u8,
    pub label: String,
    pub description: Option<String>,
    pub value: String,
}

/// An option to insert; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOption {
    pub field_id: i32,
    pub position: u8,
    pub label: String,
    pub description: Option<String>,
    pub value: String,
}

impl NewOption {
    pub fn into_stored(self, id: i32) -> StoredOption {
        StoredOption {
            id,
            field_id: self.field_id,
            position: self.position,
            label: self.label,
            description: self.description,
            value: self.value,
        }
    }
}

/// An input together with its options, ordered by option position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWithOptions {
    pub field: StoredField,
    pub options: Vec<StoredOption>,
}

/// An audit row to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub guild_id: Option<u64>,
    pub user_id: u64,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

/// A stored audit row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAuditEntry {
    pub id: i64,
    pub guild_id: Option<u64>,
    pub user_id: u64,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Abstract storage interface for forms, their inputs and the audit log.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait FormStore: Send + Sync + 'static {
    // Form operations

    /// Creates a form and returns it with its assigned id.
    async fn create_form(&self, guild_id: u64, title: &str, custom_id: &str)
        -> StorageResult<StoredForm>;

    /// Gets a form by id. A missing form is `Ok(None)`.
    async fn get_form(&self, form_id: i32) -> StorageResult<Option<StoredForm>>;

    /// Renames a form.
    async fn update_form_title(&self, form_id: i32, title: &str) -> StorageResult<()>;

    /// Deletes a form together with its inputs and their options.
    async fn delete_form(&self, form_id: i32) -> StorageResult<()>;

    // Input operations

    /// Lists a form's inputs with their options, ordered by position.
    async fn list_fields(&self, form_id: i32) -> StorageResult<Vec<FieldWithOptions>>;

    /// Begins a transaction for writing inputs and options.
    async fn begin(&self) -> StorageResult<Box<dyn FormTransaction>>;

    // Audit operations

    /// Inserts an audit row.
    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> StorageResult<()>;

    /// Lists a guild's audit rows, newest first.
    async fn list_audit_entries(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> StorageResult<Vec<StoredAuditEntry>>;

    /// Checks that the backend is reachable.
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}

/// Writes to inputs and options that become visible together on commit.
///
/// Dropping a transaction without committing rolls it back. Writes that
/// target a row which does not exist fail with [`crate::StorageError::Conflict`].
#[async_trait]
pub trait FormTransaction: Send {
    /// Deletes an input of `form_id` and its options.
    async fn delete_field(&mut self, form_id: i32, field_id: i32) -> StorageResult<()>;

    /// Overwrites every column of an input except its id, form and custom id.
    async fn update_field(&mut self, field: &StoredField) -> StorageResult<()>;

    /// Inserts an input, returning its id.
    async fn create_field(&mut self, field: &NewField) -> StorageResult<i32>;

    /// Lists an input's options as seen by this transaction.
    async fn list_options(&mut self, field_id: i32) -> StorageResult<Vec<StoredOption>>;

    async fn delete_option(&mut self, option_id: i32) -> StorageResult<()>;

    /// Inserts an option, returning its id.
    async fn create_option(&mut self, option: &NewOption) -> StorageResult<i32>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;

    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
