//! Conversions between storage records and domain types.
//!
//! The storage layer keeps field types and text styles as their wire codes;
//! decoding them here means an unknown code in the database surfaces as a
//! storage error rather than a panic.

use ticketdash_domain::model::{FieldOption, FieldType, Form, FormField, TextStyle};
use ticketdash_domain::reconcile::{PlannedField, PlannedOption};
use ticketdash_storage::{
    FieldWithOptions, NewField, NewOption, StorageError, StorageResult, StoredField, StoredForm,
    StoredOption,
};

/// Converts a stored form to the domain form.
pub fn form_from_stored(form: StoredForm) -> Form {
    Form {
        id: form.id,
        guild_id: form.guild_id,
        title: form.title,
        custom_id: form.custom_id,
    }
}

/// Converts a stored input and its options to the domain field.
pub fn field_from_stored(stored: FieldWithOptions) -> StorageResult<FormField> {
    let FieldWithOptions { field, options } = stored;

    let field_type = FieldType::try_from(field.field_type).map_err(|e| corrupt(field.id, e))?;
    let style = field
        .style
        .filter(|&code| code != 0)
        .map(TextStyle::try_from)
        .transpose()
        .map_err(|e| corrupt(field.id, e))?;

    Ok(FormField {
        id: field.id,
        form_id: field.form_id,
        field_type,
        position: field.position,
        custom_id: field.custom_id,
        label: field.label,
        description: field.description,
        placeholder: field.placeholder,
        style,
        required: field.required,
        min_length: field.min_length,
        max_length: field.max_length,
        options: options.into_iter().map(option_from_stored).collect(),
    })
}

/// Converts every stored input of a form.
pub fn fields_from_stored(stored: Vec<FieldWithOptions>) -> StorageResult<Vec<FormField>> {
    stored.into_iter().map(field_from_stored).collect()
}

fn option_from_stored(option: StoredOption) -> FieldOption {
    FieldOption {
        id: option.id,
        field_id: option.field_id,
        position: option.position,
        label: option.label,
        description: option.description,
        value: option.value,
    }
}

fn corrupt(field_id: i32, error: impl std::fmt::Display) -> StorageError {
    StorageError::InternalError {
        message: format!("input {field_id} has invalid stored data: {error}"),
    }
}

/// Row contents for updating an existing input.
pub fn stored_field(form_id: i32, field_id: i32, field: &PlannedField) -> StoredField {
    new_field(form_id, field).into_stored(field_id)
}

/// Row contents for inserting a new input.
pub fn new_field(form_id: i32, field: &PlannedField) -> NewField {
    NewField {
        form_id,
        field_type: field.field_type.code(),
        position: field.position,
        custom_id: field.custom_id.clone(),
        label: field.label.clone(),
        description: field.description.clone(),
        placeholder: field.placeholder.clone(),
        style: field.style.map(TextStyle::code),
        required: field.required,
        min_length: field.bounds.min_length,
        max_length: field.bounds.max_length,
    }
}

/// Row contents for inserting an option of `field_id`.
pub fn new_option(field_id: i32, option: &PlannedOption) -> NewOption {
    NewOption {
        field_id,
        position: option.position,
        label: option.label.clone(),
        description: option.description.clone(),
        value: option.value.clone(),
    }
}
