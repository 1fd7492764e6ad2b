//! ticketdash-domain: form definitions and the input reconciliation engine
//!
//! This crate is pure and performs no I/O. It contains:
//! - The form/field/option model and the request wire types
//! - The type constraint policy (effective length bounds, option cardinality)
//! - Field-shape checks and the batch validator
//! - The reconciliation planner that turns a validated batch into storage operations
//! - Custom identifier generation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              ticketdash-domain              │
//! ├─────────────────────────────────────────────┤
//! │  model/       - Forms, fields, wire types   │
//! │  constraints/ - Type constraint policy      │
//! │  validation/  - Shape checks, batch rules   │
//! │  reconcile/   - Operation planning          │
//! │  custom_id    - Opaque identifier source    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod constraints;
pub mod custom_id;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod validation;

// Re-export commonly used types at the crate root
pub use custom_id::{CustomIdGenerator, RandomCustomIds, CUSTOM_ID_LENGTH};
pub use error::{DomainError, DomainResult};
pub use reconcile::{PlannedField, PlannedOperation, PlannedOption, ReconciliationPlan, ReconciliationPlanner};
pub use validation::{BatchValidator, ValidatedBatch, ValidationError};
