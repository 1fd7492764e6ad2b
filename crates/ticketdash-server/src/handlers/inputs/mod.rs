//! Reconciliation of a form's input fields.
//!
//! A request carries the complete desired change to a form's field set:
//! fields to create, fields to update, and fields to delete. The handler
//! runs it through a fixed pipeline:
//!
//! 1. **Ownership**: the form must exist and belong to the caller's guild
//! 2. **Validation**: per-field shape checks, then the batch rules against
//!    the current field set
//! 3. **Planning**: an ordered list of storage operations
//! 4. **Applying**: every operation inside one transaction
//!
//! Nothing is written unless every stage succeeds.

mod applier;
mod handler;
mod types;

pub use applier::TransactionalApplier;
pub use handler::UpdateInputsHandler;
pub use types::{ReconcileOutcome, UpdateInputsError, UpdateInputsResult};
