//! Request handlers.
//!
//! Every handler takes the calling guild and user explicitly and checks that
//! the target form belongs to that guild before doing anything else.

pub mod forms;
pub mod inputs;

pub use forms::{FormDetails, FormsError, FormsHandler};
pub use inputs::{UpdateInputsError, UpdateInputsHandler};

use ticketdash_domain::model::FormId;
use ticketdash_storage::{FormStore, StorageResult, StoredForm};

/// The authenticated guild and user a request acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub guild_id: u64,
    pub user_id: u64,
}

impl Caller {
    pub fn new(guild_id: u64, user_id: u64) -> Self {
        Self { guild_id, user_id }
    }
}

/// Result of looking a form up on behalf of a caller.
#[derive(Debug)]
pub(crate) enum Ownership {
    Owned(StoredForm),
    Missing,
    OtherGuild,
}

pub(crate) async fn check_ownership<S: FormStore + ?Sized>(
    store: &S,
    caller: &Caller,
    form_id: FormId,
) -> StorageResult<Ownership> {
    Ok(match store.get_form(form_id).await? {
        Some(form) if form.guild_id == caller.guild_id => Ownership::Owned(form),
        Some(_) => Ownership::OtherGuild,
        None => Ownership::Missing,
    })
}
