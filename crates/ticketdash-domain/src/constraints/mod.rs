//! Type constraint policy.
//!
//! Maps a field's type and the caller-requested length bounds to the bounds
//! that are actually persisted, and checks option-list cardinality. Every
//! function here is pure and total.
//!
//! | Class                  | Types                              | Length bounds           |
//! |------------------------|------------------------------------|-------------------------|
//! | Free-form              | text input                         | passed through          |
//! | Bounded choice         | user/role/mentionable/channel      | clamped to `1..=25`     |
//! | Custom-option choice   | string select, radio, checkbox     | clamped to option count |

use std::collections::BTreeSet;

use crate::model::{FieldType, OptionSpec};
use crate::validation::ValidationError;

/// Upper bound on selections for any choice-type field.
pub const CHOICE_LENGTH_CAP: u16 = 25;

/// Upper bound on options for a string select.
pub const STRING_SELECT_MAX_OPTIONS: usize = 25;

/// Upper bound on options for radio and checkbox groups.
pub const GROUP_MAX_OPTIONS: usize = 10;

/// Which constraint rules govern a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintClass {
    /// Text entry; length bounds are character counts and pass through.
    FreeForm,
    /// Platform-populated choice without a custom option list.
    BoundedChoice,
    /// Choice over a caller-supplied option list.
    CustomOptions,
}

impl FieldType {
    /// Returns the constraint class governing this type.
    pub const fn constraint_class(self) -> ConstraintClass {
        match self {
            FieldType::TextInput => ConstraintClass::FreeForm,
            FieldType::UserSelect
            | FieldType::RoleSelect
            | FieldType::MentionableSelect
            | FieldType::ChannelSelect => ConstraintClass::BoundedChoice,
            FieldType::StringSelect | FieldType::RadioGroup | FieldType::CheckboxGroup => {
                ConstraintClass::CustomOptions
            }
        }
    }

    /// Returns true if fields of this type carry an option list.
    pub const fn has_options(self) -> bool {
        matches!(self.constraint_class(), ConstraintClass::CustomOptions)
    }

    /// Inclusive bounds on the option count, or `None` for types without options.
    pub const fn option_count_bounds(self) -> Option<(usize, usize)> {
        match self {
            FieldType::StringSelect => Some((1, STRING_SELECT_MAX_OPTIONS)),
            FieldType::RadioGroup => Some((2, GROUP_MAX_OPTIONS)),
            FieldType::CheckboxGroup => Some((1, GROUP_MAX_OPTIONS)),
            _ => None,
        }
    }
}

/// Minimum and maximum length of a field.
///
/// For text input these are character counts; for choice types they are the
/// number of selections a user may make.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LengthBounds {
    pub min_length: Option<u16>,
    pub max_length: Option<u16>,
}

impl LengthBounds {
    pub const fn new(min_length: Option<u16>, max_length: Option<u16>) -> Self {
        Self {
            min_length,
            max_length,
        }
    }
}

/// Computes the bounds to persist for a field.
///
/// `option_count` is only consulted for custom-option types.
pub fn effective_bounds(
    field_type: FieldType,
    requested: LengthBounds,
    option_count: usize,
) -> LengthBounds {
    let max_length = match field_type.constraint_class() {
        ConstraintClass::FreeForm => return requested,
        ConstraintClass::BoundedChoice => capped_max(requested.max_length),
        ConstraintClass::CustomOptions if option_count > 0 => {
            let options = u16::try_from(option_count).unwrap_or(u16::MAX);
            match requested.max_length {
                Some(max) if (1..=options).contains(&max) => max,
                _ => options,
            }
        }
        ConstraintClass::CustomOptions => capped_max(requested.max_length),
    }
    .max(1);

    let min_length = requested
        .min_length
        .unwrap_or(0)
        .min(CHOICE_LENGTH_CAP)
        .min(max_length);

    LengthBounds::new(Some(min_length), Some(max_length))
}

fn capped_max(requested: Option<u16>) -> u16 {
    match requested {
        Some(max) if (1..=CHOICE_LENGTH_CAP).contains(&max) => max,
        _ => CHOICE_LENGTH_CAP,
    }
}

/// Checks that `options` is acceptable for a field of `field_type`.
///
/// Cardinality is checked first, then value uniqueness.
pub fn check_options(field_type: FieldType, options: &[OptionSpec]) -> Result<(), ValidationError> {
    let Some((min, max)) = field_type.option_count_bounds() else {
        if options.is_empty() {
            return Ok(());
        }
        return Err(ValidationError::OptionsNotSupported { field_type });
    };

    if options.len() < min {
        return Err(ValidationError::TooFewOptions { field_type, min });
    }
    if options.len() > max {
        return Err(ValidationError::TooManyOptions { field_type, max });
    }

    let duplicates = duplicate_option_values(options);
    if !duplicates.is_empty() {
        return Err(ValidationError::DuplicateOptionValues { values: duplicates });
    }

    Ok(())
}

/// Returns the sorted set of option values that occur more than once.
///
/// Empty values are ignored; the shape checks reject them separately.
pub fn duplicate_option_values(options: &[OptionSpec]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();

    for option in options.iter().filter(|o| !o.value.is_empty()) {
        if !seen.insert(option.value.as_str()) {
            duplicates.insert(option.value.as_str());
        }
    }

    duplicates.into_iter().map(str::to_owned).collect()
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn field_type_strategy() -> impl Strategy<Value = FieldType> {
        prop::sample::select(FieldType::ALL.to_vec())
    }

    fn requested_strategy() -> impl Strategy<Value = LengthBounds> {
        (
            prop::option::of(1u16..=1024),
            prop::option::of(1u16..=1024),
        )
            .prop_map(|(min, max)| LengthBounds::new(min, max))
    }

    proptest! {
        #[test]
        fn test_effective_bounds_is_idempotent(
            field_type in field_type_strategy(),
            requested in requested_strategy(),
            option_count in 0usize..=25,
        ) {
            let once = effective_bounds(field_type, requested, option_count);
            let twice = effective_bounds(field_type, once, option_count);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_choice_bounds_are_ordered_and_capped(
            field_type in field_type_strategy(),
            requested in requested_strategy(),
            option_count in 0usize..=25,
        ) {
            prop_assume!(field_type.constraint_class() != ConstraintClass::FreeForm);
            let derived = effective_bounds(field_type, requested, option_count);
            let min = derived.min_length.unwrap_or_default();
            let max = derived.max_length.unwrap_or_default();
            prop_assert!(max >= 1);
            prop_assert!(max <= CHOICE_LENGTH_CAP);
            prop_assert!(min <= max);
            if field_type.has_options() && option_count > 0 {
                prop_assert!(usize::from(max) <= option_count);
            }
        }
    }
}
