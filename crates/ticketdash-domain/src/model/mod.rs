//! Form, field and option types, plus the reconciliation request wire format.

mod types;

pub use types::*;
