//! ticketdash-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for forms, including:
//! - FormStore and FormTransaction traits
//! - In-memory implementation for tests and single-node deployments
//! - PostgreSQL implementation for production
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             ticketdash-storage              │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - FormStore / FormTransaction  │
//! │  memory.rs   - In-memory implementation     │
//! │  postgres.rs - PostgreSQL implementation    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

// Re-export commonly used types
pub use error::{HealthStatus, StorageError, StorageResult};
pub use memory::MemoryFormStore;
pub use postgres::{PostgresConfig, PostgresFormStore};
pub use traits::{
    FieldWithOptions, FormStore, FormTransaction, NewAuditEntry, NewField, NewOption,
    StoredAuditEntry, StoredField, StoredForm, StoredOption,
};
