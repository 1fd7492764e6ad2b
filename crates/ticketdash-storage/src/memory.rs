//! In-memory storage implementation.
//!
//! Forms, inputs and options live behind one `tokio::sync::RwLock`; the audit
//! log has its own lock and is never part of a transaction. A transaction
//! copies the rows of a form the first time it touches it and records each
//! write in a journal. On commit the journal is replayed, under the write
//! lock, against a fresh copy of just those forms' rows. The copy replaces
//! the live rows only if every entry applies, so a conflicting commit changes
//! nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{HealthStatus, StorageError, StorageResult};
use crate::traits::{
    FieldWithOptions, FormStore, FormTransaction, NewAuditEntry, NewField, NewOption,
    StoredAuditEntry, StoredField, StoredForm, StoredOption,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    forms: BTreeMap<i32, StoredForm>,
    fields: BTreeMap<i32, StoredField>,
    options: BTreeMap<i32, StoredOption>,
}

#[derive(Debug)]
struct IdCounters {
    form: AtomicI32,
    field: AtomicI32,
    option: AtomicI32,
    audit: AtomicI64,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            form: AtomicI32::new(1),
            field: AtomicI32::new(1),
            option: AtomicI32::new(1),
            audit: AtomicI64::new(1),
        }
    }
}

/// One recorded transaction write.
#[derive(Debug, Clone)]
enum JournalEntry {
    DeleteField { form_id: i32, field_id: i32 },
    UpdateField(StoredField),
    CreateField(StoredField),
    DeleteOption { option_id: i32 },
    CreateOption(StoredOption),
}

impl Tables {
    fn apply(&mut self, entry: &JournalEntry) -> StorageResult<()> {
        match entry {
            JournalEntry::DeleteField { form_id, field_id } => {
                if !self.fields.get(field_id).is_some_and(|f| f.form_id == *form_id) {
                    return Err(conflict(format!("input {field_id} of form {form_id} no longer exists")));
                }
                self.fields.remove(field_id);
                self.options.retain(|_, o| o.field_id != *field_id);
            }
            JournalEntry::UpdateField(update) => {
                let Some(field) = self
                    .fields
                    .get_mut(&update.id)
                    .filter(|f| f.form_id == update.form_id)
                else {
                    return Err(conflict(format!(
                        "input {} of form {} no longer exists",
                        update.id, update.form_id
                    )));
                };
                *field = StoredField {
                    custom_id: std::mem::take(&mut field.custom_id),
                    ..update.clone()
                };
            }
            JournalEntry::CreateField(field) => {
                if !self.forms.contains_key(&field.form_id) {
                    return Err(conflict(format!("form {} no longer exists", field.form_id)));
                }
                self.fields.insert(field.id, field.clone());
            }
            JournalEntry::DeleteOption { option_id } => {
                if self.options.remove(option_id).is_none() {
                    return Err(conflict(format!("option {option_id} no longer exists")));
                }
            }
            JournalEntry::CreateOption(option) => {
                if !self.fields.contains_key(&option.field_id) {
                    return Err(conflict(format!("input {} no longer exists", option.field_id)));
                }
                self.options.insert(option.id, option.clone());
            }
        }
        Ok(())
    }

    fn options_of(&self, field_id: i32) -> Vec<StoredOption> {
        let mut options: Vec<StoredOption> = self
            .options
            .values()
            .filter(|o| o.field_id == field_id)
            .cloned()
            .collect();
        options.sort_by_key(|o| (o.position, o.id));
        options
    }

    /// Copies the rows belonging to `form_ids`.
    fn scoped(&self, form_ids: &BTreeSet<i32>) -> Tables {
        let forms = self
            .forms
            .iter()
            .filter(|(id, _)| form_ids.contains(id))
            .map(|(id, form)| (*id, form.clone()))
            .collect();
        let fields: BTreeMap<i32, StoredField> = self
            .fields
            .iter()
            .filter(|(_, f)| form_ids.contains(&f.form_id))
            .map(|(id, field)| (*id, field.clone()))
            .collect();
        let options = self
            .options
            .iter()
            .filter(|(_, o)| fields.contains_key(&o.field_id))
            .map(|(id, option)| (*id, option.clone()))
            .collect();
        Tables {
            forms,
            fields,
            options,
        }
    }

    /// Replaces the inputs and options of `form_ids` with those in `scoped`.
    fn replace_scope(&mut self, form_ids: &BTreeSet<i32>, scoped: Tables) {
        let stale: BTreeSet<i32> = self
            .fields
            .values()
            .filter(|f| form_ids.contains(&f.form_id))
            .map(|f| f.id)
            .collect();
        self.fields.retain(|id, _| !stale.contains(id));
        self.options.retain(|_, o| !stale.contains(&o.field_id));
        self.fields.extend(scoped.fields);
        self.options.extend(scoped.options);
    }

    fn delete_form(&mut self, form_id: i32) {
        self.forms.remove(&form_id);
        let removed: BTreeSet<i32> = self
            .fields
            .values()
            .filter(|f| f.form_id == form_id)
            .map(|f| f.id)
            .collect();
        self.fields.retain(|id, _| !removed.contains(id));
        self.options.retain(|_, o| !removed.contains(&o.field_id));
    }
}

fn conflict(message: String) -> StorageError {
    StorageError::Conflict { message }
}

/// In-memory implementation of FormStore.
#[derive(Debug, Default)]
pub struct MemoryFormStore {
    tables: Arc<RwLock<Tables>>,
    audit_log: RwLock<Vec<StoredAuditEntry>>,
    ids: Arc<IdCounters>,
}

impl MemoryFormStore {
    /// Creates a new in-memory form store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory form store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn begin_transaction(&self) -> MemoryTransaction {
        MemoryTransaction {
            live: Arc::clone(&self.tables),
            ids: Arc::clone(&self.ids),
            view: Tables::default(),
            loaded: BTreeSet::new(),
            journal: Vec::new(),
        }
    }
}

#[async_trait]
impl FormStore for MemoryFormStore {
    #[instrument(skip(self, title, custom_id))]
    async fn create_form(
        &self,
        guild_id: u64,
        title: &str,
        custom_id: &str,
    ) -> StorageResult<StoredForm> {
        let form = StoredForm {
            id: self.ids.form.fetch_add(1, Ordering::SeqCst),
            guild_id,
            title: title.to_string(),
            custom_id: custom_id.to_string(),
        };
        self.tables.write().await.forms.insert(form.id, form.clone());
        Ok(form)
    }

    async fn get_form(&self, form_id: i32) -> StorageResult<Option<StoredForm>> {
        Ok(self.tables.read().await.forms.get(&form_id).cloned())
    }

    #[instrument(skip(self, title))]
    async fn update_form_title(&self, form_id: i32, title: &str) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let form = tables
            .forms
            .get_mut(&form_id)
            .ok_or(StorageError::FormNotFound { form_id })?;
        form.title = title.to_string();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_form(&self, form_id: i32) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.forms.contains_key(&form_id) {
            return Err(StorageError::FormNotFound { form_id });
        }
        tables.delete_form(form_id);
        Ok(())
    }

    async fn list_fields(&self, form_id: i32) -> StorageResult<Vec<FieldWithOptions>> {
        let tables = self.tables.read().await;
        let mut fields: Vec<FieldWithOptions> = tables
            .fields
            .values()
            .filter(|f| f.form_id == form_id)
            .map(|field| FieldWithOptions {
                options: tables.options_of(field.id),
                field: field.clone(),
            })
            .collect();
        fields.sort_by_key(|f| (f.field.position, f.field.id));
        Ok(fields)
    }

    async fn begin(&self) -> StorageResult<Box<dyn FormTransaction>> {
        Ok(Box::new(self.begin_transaction()))
    }

    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> StorageResult<()> {
        let stored = StoredAuditEntry {
            id: self.ids.audit.fetch_add(1, Ordering::SeqCst),
            guild_id: entry.guild_id,
            user_id: entry.user_id,
            action_type: entry.action_type,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            old_data: entry.old_data,
            new_data: entry.new_data,
            metadata: entry.metadata,
            created_at: chrono::Utc::now(),
        };
        self.audit_log.write().await.push(stored);
        Ok(())
    }

    async fn list_audit_entries(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> StorageResult<Vec<StoredAuditEntry>> {
        Ok(self
            .audit_log
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.guild_id == Some(guild_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = Instant::now();
        let _tables = self.tables.read().await;
        Ok(HealthStatus {
            healthy: true,
            latency: start.elapsed(),
            message: Some("in-memory storage".to_string()),
        })
    }
}

/// Transaction over a [`MemoryFormStore`].
struct MemoryTransaction {
    live: Arc<RwLock<Tables>>,
    ids: Arc<IdCounters>,
    /// Rows of the forms in `loaded`, with the journal applied.
    view: Tables,
    loaded: BTreeSet<i32>,
    journal: Vec<JournalEntry>,
}

impl MemoryTransaction {
    fn record(&mut self, entry: JournalEntry) -> StorageResult<()> {
        self.view.apply(&entry)?;
        self.journal.push(entry);
        Ok(())
    }

    /// Copies a form's rows into the view the first time it is touched.
    async fn load_form(&mut self, form_id: i32) {
        if !self.loaded.insert(form_id) {
            return;
        }
        let scoped = self.live.read().await.scoped(&BTreeSet::from([form_id]));
        self.view.forms.extend(scoped.forms);
        self.view.fields.extend(scoped.fields);
        self.view.options.extend(scoped.options);
    }

    /// Loads the form owning `field_id`, if the field exists anywhere.
    async fn load_field_owner(&mut self, field_id: i32) {
        if self.view.fields.contains_key(&field_id) {
            return;
        }
        let owner = self.live.read().await.fields.get(&field_id).map(|f| f.form_id);
        if let Some(form_id) = owner {
            self.load_form(form_id).await;
        }
    }

    async fn load_option_owner(&mut self, option_id: i32) {
        if self.view.options.contains_key(&option_id) {
            return;
        }
        let owner = {
            let live = self.live.read().await;
            live.options
                .get(&option_id)
                .and_then(|o| live.fields.get(&o.field_id))
                .map(|f| f.form_id)
        };
        if let Some(form_id) = owner {
            self.load_form(form_id).await;
        }
    }
}

#[async_trait]
impl FormTransaction for MemoryTransaction {
    async fn delete_field(&mut self, form_id: i32, field_id: i32) -> StorageResult<()> {
        self.load_form(form_id).await;
        self.record(JournalEntry::DeleteField { form_id, field_id })
    }

    async fn update_field(&mut self, field: &StoredField) -> StorageResult<()> {
        self.load_form(field.form_id).await;
        self.record(JournalEntry::UpdateField(field.clone()))
    }

    async fn create_field(&mut self, field: &NewField) -> StorageResult<i32> {
        self.load_form(field.form_id).await;
        let id = self.ids.field.fetch_add(1, Ordering::SeqCst);
        self.record(JournalEntry::CreateField(field.clone().into_stored(id)))?;
        Ok(id)
    }

    async fn list_options(&mut self, field_id: i32) -> StorageResult<Vec<StoredOption>> {
        self.load_field_owner(field_id).await;
        Ok(self.view.options_of(field_id))
    }

    async fn delete_option(&mut self, option_id: i32) -> StorageResult<()> {
        self.load_option_owner(option_id).await;
        self.record(JournalEntry::DeleteOption { option_id })
    }

    async fn create_option(&mut self, option: &NewOption) -> StorageResult<i32> {
        self.load_field_owner(option.field_id).await;
        let id = self.ids.option.fetch_add(1, Ordering::SeqCst);
        self.record(JournalEntry::CreateOption(option.clone().into_stored(id)))?;
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        if self.journal.is_empty() {
            return Ok(());
        }
        let mut live = self.live.write().await;
        let mut next = live.scoped(&self.loaded);
        for entry in &self.journal {
            next.apply(entry)?;
        }
        live.replace_scope(&self.loaded, next);
        debug!(
            writes = self.journal.len(),
            forms = self.loaded.len(),
            "committed memory transaction"
        );
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        debug!(writes = self.journal.len(), "rolled back memory transaction");
        Ok(())
    }
}
