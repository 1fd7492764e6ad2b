//! Core type definitions for forms and their input fields.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a form.
pub type FormId = i32;

/// Identifier of a form input field.
pub type FieldId = i32;

/// Identifier of a select option belonging to a field.
pub type OptionId = i32;

/// The kind of input widget a field renders as.
///
/// Wire codes follow the chat platform's component type numbers, which is why
/// they are not contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FieldType {
    /// Select menu with a custom option list.
    StringSelect,
    /// Free-text entry box.
    TextInput,
    /// Picker over the guild's members.
    UserSelect,
    /// Picker over the guild's roles.
    RoleSelect,
    /// Picker over members and roles.
    MentionableSelect,
    /// Picker over the guild's channels.
    ChannelSelect,
    /// Single choice from a custom option list.
    RadioGroup,
    /// Multiple choice from a custom option list.
    CheckboxGroup,
}

impl FieldType {
    /// All field types, in wire-code order.
    pub const ALL: [FieldType; 8] = [
        FieldType::StringSelect,
        FieldType::TextInput,
        FieldType::UserSelect,
        FieldType::RoleSelect,
        FieldType::MentionableSelect,
        FieldType::ChannelSelect,
        FieldType::RadioGroup,
        FieldType::CheckboxGroup,
    ];

    /// Returns the wire code for this type.
    pub const fn code(self) -> u8 {
        match self {
            FieldType::StringSelect => 3,
            FieldType::TextInput => 4,
            FieldType::UserSelect => 5,
            FieldType::RoleSelect => 6,
            FieldType::MentionableSelect => 7,
            FieldType::ChannelSelect => 8,
            FieldType::RadioGroup => 21,
            FieldType::CheckboxGroup => 22,
        }
    }

    /// Looks up a field type by wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Human-readable name used in error messages.
    pub const fn display_name(self) -> &'static str {
        match self {
            FieldType::StringSelect => "String select",
            FieldType::TextInput => "Text",
            FieldType::UserSelect => "User select",
            FieldType::RoleSelect => "Role select",
            FieldType::MentionableSelect => "Mentionable select",
            FieldType::ChannelSelect => "Channel select",
            FieldType::RadioGroup => "Radio group",
            FieldType::CheckboxGroup => "Checkbox group",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Error returned when a wire code does not name a known field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown input type: {0}")]
pub struct UnknownFieldType(pub u8);

impl TryFrom<u8> for FieldType {
    type Error = UnknownFieldType;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(UnknownFieldType(code))
    }
}

impl From<FieldType> for u8 {
    fn from(field_type: FieldType) -> Self {
        field_type.code()
    }
}

/// Presentation style of a text-input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TextStyle {
    /// Single-line input.
    Short,
    /// Multi-line input.
    Paragraph,
}

impl TextStyle {
    /// Returns the wire code for this style.
    pub const fn code(self) -> u8 {
        match self {
            TextStyle::Short => 1,
            TextStyle::Paragraph => 2,
        }
    }
}

/// Error returned when a wire code does not name a known text style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown text style: {0}")]
pub struct UnknownTextStyle(pub u8);

impl TryFrom<u8> for TextStyle {
    type Error = UnknownTextStyle;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(TextStyle::Short),
            2 => Ok(TextStyle::Paragraph),
            other => Err(UnknownTextStyle(other)),
        }
    }
}

impl From<TextStyle> for u8 {
    fn from(style: TextStyle) -> Self {
        style.code()
    }
}

/// A form owned by a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub id: FormId,
    pub guild_id: u64,
    pub title: String,
    pub custom_id: String,
}

/// A persisted input field, as currently stored for a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub id: FieldId,
    pub form_id: FormId,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub position: u8,
    pub custom_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<TextStyle>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

/// A persisted option of a choice-type field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: OptionId,
    pub field_id: FieldId,
    pub position: u8,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: String,
}

/// Caller-supplied description of a field, used for both creates and updates.
///
/// Length bounds are the *requested* values; the stored values are derived
/// from them by [`crate::constraints::effective_bounds`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub position: u8,
    #[serde(
        default,
        deserialize_with = "deserialize_style",
        skip_serializing_if = "Option::is_none"
    )]
    pub style: Option<TextStyle>,
    #[serde(default)]
    pub required: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_unspecified_length",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_length: Option<u16>,
    #[serde(
        default,
        deserialize_with = "deserialize_unspecified_length",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_length: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionSpec>>,
}

impl FieldSpec {
    /// Creates a spec with the given label, type and position and no other settings.
    pub fn new(label: impl Into<String>, field_type: FieldType, position: u8) -> Self {
        Self {
            label: label.into(),
            description: None,
            placeholder: None,
            field_type,
            position,
            style: None,
            required: false,
            min_length: None,
            max_length: None,
            options: None,
        }
    }

    /// Sets the requested length bounds.
    pub fn with_lengths(mut self, min_length: Option<u16>, max_length: Option<u16>) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    /// Sets the option list.
    pub fn with_options(mut self, options: Vec<OptionSpec>) -> Self {
        self.options = Some(options);
        self
    }

    /// Returns the supplied options, empty when none were given.
    pub fn options(&self) -> &[OptionSpec] {
        self.options.as_deref().unwrap_or_default()
    }
}

/// Caller-supplied option of a choice-type field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: String,
}

impl OptionSpec {
    /// Creates an option whose label and value are the same string.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            description: None,
            value,
        }
    }
}

/// An update of one existing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub id: FieldId,
    #[serde(flatten)]
    pub spec: FieldSpec,
}

impl FieldUpdate {
    pub fn new(id: FieldId, spec: FieldSpec) -> Self {
        Self { id, spec }
    }
}

/// A reconciliation request: the creates, updates and deletes to apply to a
/// form's input fields in one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputsUpdate {
    #[serde(rename = "create", default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub creates: Vec<FieldSpec>,
    #[serde(rename = "update", default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub updates: Vec<FieldUpdate>,
    #[serde(rename = "delete", default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub deletes: Vec<FieldId>,
}

impl InputsUpdate {
    /// Number of fields the form will have once the batch is applied.
    pub fn resulting_field_count(&self) -> usize {
        self.creates.len() + self.updates.len()
    }
}

/// Deserializes `null` as an empty Vec (dashboard clients send `null` for empty batches).
fn deserialize_null_as_empty_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `0` on the wire means "not specified".
fn deserialize_unspecified_length<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u16>::deserialize(deserializer)?.filter(|value| *value != 0))
}

fn deserialize_style<'de, D>(deserializer: D) -> Result<Option<TextStyle>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<u8>::deserialize(deserializer)? {
        None | Some(0) => Ok(None),
        Some(code) => TextStyle::try_from(code)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_codes_round_trip() {
        for field_type in FieldType::ALL {
            assert_eq!(FieldType::from_code(field_type.code()), Some(field_type));
        }
        assert_eq!(FieldType::from_code(1), None);
        assert_eq!(FieldType::try_from(9), Err(UnknownFieldType(9)));
    }

    #[test]
    fn test_inputs_update_accepts_null_batches() {
        let body = r#"{"create": null, "update": null, "delete": [4]}"#;
        let request: InputsUpdate = serde_json::from_str(body).unwrap();
        assert!(request.creates.is_empty());
        assert!(request.updates.is_empty());
        assert_eq!(request.deletes, vec![4]);
    }

    #[test]
    fn test_zero_lengths_and_style_mean_unspecified() {
        let body = r#"{
            "id": 7,
            "label": "Reason",
            "type": 4,
            "position": 1,
            "style": 0,
            "required": true,
            "min_length": 0,
            "max_length": 300
        }"#;
        let update: FieldUpdate = serde_json::from_str(body).unwrap();
        assert_eq!(update.id, 7);
        assert_eq!(update.spec.field_type, FieldType::TextInput);
        assert_eq!(update.spec.style, None);
        assert_eq!(update.spec.min_length, None);
        assert_eq!(update.spec.max_length, Some(300));
        assert!(update.spec.options().is_empty());
    }

    #[test]
    fn test_unknown_field_type_is_rejected() {
        let body = r#"{"label": "x", "type": 2, "position": 1}"#;
        let result: Result<FieldSpec, _> = serde_json::from_str(body);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_style_is_rejected() {
        let body = r#"{"label": "x", "type": 4, "position": 1, "style": 3}"#;
        let result: Result<FieldSpec, _> = serde_json::from_str(body);
        assert!(result.is_err());
    }
}
