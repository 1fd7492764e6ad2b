//! Per-field shape checks.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::model::{FieldSpec, InputsUpdate, OptionSpec};

/// Longest allowed form title, in characters.
pub const MAX_TITLE_LENGTH: usize = 45;

const MAX_LABEL_LENGTH: usize = 45;
const MAX_DESCRIPTION_LENGTH: usize = 100;
const MAX_PLACEHOLDER_LENGTH: usize = 100;
const MAX_POSITION: u8 = 5;
const MAX_REQUESTED_LENGTH: u16 = 1024;
const MAX_OPTIONS: usize = 25;
const MAX_OPTION_TEXT_LENGTH: usize = 100;

/// One shape problem, located by a path such as `update[1].options[0].value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Checks every field of the request, collecting all violations.
pub fn check_shape(request: &InputsUpdate) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    for (i, spec) in request.creates.iter().enumerate() {
        check_field(&format!("create[{i}]"), spec, &mut violations);
    }
    for (i, update) in request.updates.iter().enumerate() {
        check_field(&format!("update[{i}]"), &update.spec, &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::InvalidShape { violations })
    }
}

/// Trims a form title and checks its length.
pub fn check_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    let length = trimmed.chars().count();

    if length == 0 {
        return Err(ValidationError::InvalidTitle {
            message: "Form title cannot be empty".to_string(),
        });
    }
    if length > MAX_TITLE_LENGTH {
        return Err(ValidationError::InvalidTitle {
            message: format!("Form title must be {MAX_TITLE_LENGTH} characters or less"),
        });
    }

    Ok(trimmed.to_string())
}

fn check_field(path: &str, spec: &FieldSpec, violations: &mut Vec<FieldViolation>) {
    let mut push = |field: &str, message: String| {
        violations.push(FieldViolation {
            path: format!("{path}.{field}"),
            message,
        })
    };

    if let Some(message) = text_length("label", &spec.label, 1, MAX_LABEL_LENGTH) {
        push("label", message);
    }
    if let Some(message) = spec
        .description
        .as_deref()
        .and_then(|d| text_length("description", d, 0, MAX_DESCRIPTION_LENGTH))
    {
        push("description", message);
    }
    if let Some(message) = spec
        .placeholder
        .as_deref()
        .and_then(|p| text_length("placeholder", p, 1, MAX_PLACEHOLDER_LENGTH))
    {
        push("placeholder", message);
    }
    if !(1..=MAX_POSITION).contains(&spec.position) {
        push(
            "position",
            format!("position must be between 1 and {MAX_POSITION}"),
        );
    }
    for (name, value) in [("min_length", spec.min_length), ("max_length", spec.max_length)] {
        if value.is_some_and(|v| v > MAX_REQUESTED_LENGTH) {
            push(name, format!("{name} must be at most {MAX_REQUESTED_LENGTH}"));
        }
    }

    let options = spec.options();
    if options.len() > MAX_OPTIONS {
        push("options", format!("at most {MAX_OPTIONS} options are allowed"));
    }
    for (i, option) in options.iter().enumerate() {
        check_option(&format!("{path}.options[{i}]"), option, violations);
    }
}

fn check_option(path: &str, option: &OptionSpec, violations: &mut Vec<FieldViolation>) {
    let checks = [
        ("label", Some(option.label.as_str()), 1),
        ("value", Some(option.value.as_str()), 1),
        ("description", option.description.as_deref(), 0),
    ];

    for (field, text, min) in checks {
        if let Some(message) =
            text.and_then(|t| text_length(field, t, min, MAX_OPTION_TEXT_LENGTH))
        {
            violations.push(FieldViolation {
                path: format!("{path}.{field}"),
                message,
            });
        }
    }
}

fn text_length(name: &str, text: &str, min: usize, max: usize) -> Option<String> {
    let length = text.chars().count();
    if length < min {
        Some(format!("{name} is required"))
    } else if length > max {
        Some(format!("{name} must be at most {max} characters"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, FieldUpdate};

    #[test]
    fn test_valid_request_passes() {
        let request = InputsUpdate {
            creates: vec![FieldSpec::new("Why?", FieldType::TextInput, 1)],
            ..Default::default()
        };
        assert!(check_shape(&request).is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let mut spec = FieldSpec::new("x".repeat(46), FieldType::StringSelect, 9);
        spec.placeholder = Some(String::new());
        spec.max_length = Some(2000);
        spec.options = Some(vec![OptionSpec {
            label: String::new(),
            description: None,
            value: "v".repeat(101),
        }]);
        let request = InputsUpdate {
            updates: vec![FieldUpdate::new(3, spec)],
            ..Default::default()
        };

        let Err(ValidationError::InvalidShape { violations }) = check_shape(&request) else {
            panic!("expected shape violations");
        };
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "update[0].label",
                "update[0].placeholder",
                "update[0].position",
                "update[0].max_length",
                "update[0].options[0].label",
                "update[0].options[0].value",
            ]
        );
    }

    #[test]
    fn test_too_many_options() {
        let options = (0..26).map(|i| OptionSpec::new(format!("v{i}"))).collect();
        let request = InputsUpdate {
            creates: vec![FieldSpec::new("Pick", FieldType::StringSelect, 1).with_options(options)],
            ..Default::default()
        };
        let err = check_shape(&request).unwrap_err();
        assert!(err.to_string().contains("create[0].options: at most 25 options"), "{err}");
    }

    #[test]
    fn test_title_is_trimmed() {
        assert_eq!(check_title("  Appeals  ").unwrap(), "Appeals");
        assert!(check_title("   ").is_err());
        assert!(check_title(&"t".repeat(46)).is_err());
        assert!(check_title(&"t".repeat(45)).is_ok());
    }
}
