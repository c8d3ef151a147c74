//! Field-to-value validation for captured survey data.
//!
//! Checks a record's data map against a project's field definitions
//! before capture. One level of nesting is validated; deeper nesting is
//! rejected outright.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::models::{
    has_multi_level_nesting, CheckboxRules, DateRules, FieldConfig, FieldKind, ImageRules,
    NumberRules, TextRules,
};

/// One failed constraint, keyed by the field it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub key: String,
    pub message: String,
}

impl FieldIssue {
    fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a data map against the given field definitions.
pub fn validate_record(
    fields: &[FieldConfig],
    data: &Map<String, Value>,
) -> Result<(), Vec<FieldIssue>> {
    let mut issues = Vec::new();

    for field in fields {
        let value = data.get(&field.key);
        check_field(field, value, &mut issues);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn check_field(field: &FieldConfig, value: Option<&Value>, issues: &mut Vec<FieldIssue>) {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        // Nested fields enforce their minimum through min_item instead.
        if field.required && !matches!(field.kind, FieldKind::Nested { .. }) {
            issues.push(FieldIssue::new(&field.key, "value is required"));
        } else if let FieldKind::Nested { rules, .. } = &field.kind {
            if rules.min_item.is_some_and(|min| min > 0) {
                issues.push(FieldIssue::new(&field.key, "at least one item is required"));
            }
        }
        return;
    };

    match &field.kind {
        FieldKind::Text { rules } => check_text(&field.key, rules, value, issues),
        FieldKind::Number { rules } => check_number(&field.key, rules, value, issues),
        FieldKind::Date { rules } => check_date(&field.key, rules, value, issues),
        FieldKind::Checkbox { rules } => check_checkbox(&field.key, rules, value, issues),
        FieldKind::Image { rules } => check_image(&field.key, rules, value, issues),
        FieldKind::Boolean => {
            if !value.is_boolean() {
                issues.push(FieldIssue::new(&field.key, "expected a boolean"));
            }
        }
        FieldKind::Nested { fields, rules } => {
            check_nested(&field.key, fields, rules.min_item, value, issues);
        }
    }
}

fn check_text(key: &str, rules: &TextRules, value: &Value, issues: &mut Vec<FieldIssue>) {
    let Some(text) = value.as_str() else {
        issues.push(FieldIssue::new(key, "expected a string"));
        return;
    };

    let length = text.chars().count();
    if let Some(min) = rules.min_length {
        if length < min {
            issues.push(FieldIssue::new(
                key,
                format!("minimum {min} characters required"),
            ));
        }
    }
    if let Some(max) = rules.max_length {
        if length > max {
            issues.push(FieldIssue::new(
                key,
                format!("maximum {max} characters allowed"),
            ));
        }
    }
    if let Some(pattern) = rules.pattern.as_deref() {
        match regex::Regex::new(pattern) {
            Ok(re) if !re.is_match(text) => {
                issues.push(FieldIssue::new(key, "invalid pattern"));
            }
            Ok(_) => {}
            Err(_) => issues.push(FieldIssue::new(key, "field pattern is not a valid regex")),
        }
    }
}

fn check_number(key: &str, rules: &NumberRules, value: &Value, issues: &mut Vec<FieldIssue>) {
    let Some(number) = value.as_f64() else {
        issues.push(FieldIssue::new(key, "expected a number"));
        return;
    };

    if let Some(min) = rules.min {
        if number < min {
            issues.push(FieldIssue::new(key, format!("minimum value is {min}")));
        }
    }
    if let Some(max) = rules.max {
        if number > max {
            issues.push(FieldIssue::new(key, format!("maximum value is {max}")));
        }
    }
    if rules.is_float == Some(false) && number.fract() != 0.0 {
        issues.push(FieldIssue::new(key, "expected an integer"));
    }
}

fn check_date(key: &str, rules: &DateRules, value: &Value, issues: &mut Vec<FieldIssue>) {
    let date = value
        .as_str()
        .and_then(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok());
    let Some(date) = date else {
        issues.push(FieldIssue::new(key, "expected a YYYY-MM-DD date"));
        return;
    };

    if let Some(min) = rules.min_date {
        if date < min {
            issues.push(FieldIssue::new(key, format!("date must be after {min}")));
        }
    }
    if let Some(max) = rules.max_date {
        if date > max {
            issues.push(FieldIssue::new(key, format!("date must be before {max}")));
        }
    }
}

fn check_checkbox(key: &str, rules: &CheckboxRules, value: &Value, issues: &mut Vec<FieldIssue>) {
    let selected: Vec<&str> = match value {
        Value::String(text) => vec![text.as_str()],
        Value::Array(items) => {
            let mut keys = Vec::new();
            for item in items {
                match item.as_str() {
                    Some(text) => keys.push(text),
                    None => {
                        issues.push(FieldIssue::new(key, "expected option keys as strings"));
                        return;
                    }
                }
            }
            keys
        }
        _ => {
            issues.push(FieldIssue::new(key, "expected an option key or a list"));
            return;
        }
    };

    if selected.len() > 1 && !rules.multiple {
        issues.push(FieldIssue::new(key, "only one option may be selected"));
    }
    for choice in selected {
        if !rules.options.iter().any(|option| option.key == choice) {
            issues.push(FieldIssue::new(key, format!("unknown option '{choice}'")));
        }
    }
}

fn check_image(key: &str, rules: &ImageRules, value: &Value, issues: &mut Vec<FieldIssue>) {
    let Some(reference) = value.as_str() else {
        issues.push(FieldIssue::new(key, "expected an image reference"));
        return;
    };

    if let Some(formats) = rules.accepted_formats.as_deref() {
        let accepted = formats
            .iter()
            .any(|format| reference.starts_with(&format!("data:{format}")));
        if reference.starts_with("data:") && !accepted {
            issues.push(FieldIssue::new(key, "unsupported image format"));
        }
    }
    if let Some(max_size) = rules.max_size {
        if reference.len() as u64 > max_size {
            issues.push(FieldIssue::new(
                key,
                format!("image exceeds {max_size} bytes"),
            ));
        }
    }
}

fn check_nested(
    key: &str,
    fields: &[FieldConfig],
    min_item: Option<usize>,
    value: &Value,
    issues: &mut Vec<FieldIssue>,
) {
    if has_multi_level_nesting(fields) {
        issues.push(FieldIssue::new(key, "nested fields cannot nest further"));
        return;
    }

    let Some(items) = value.as_array() else {
        issues.push(FieldIssue::new(key, "expected a list of items"));
        return;
    };

    if let Some(min) = min_item {
        if items.len() < min {
            issues.push(FieldIssue::new(key, format!("at least {min} items required")));
        }
    }

    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            issues.push(FieldIssue::new(key, format!("item {index} is not an object")));
            continue;
        };
        if let Err(nested_issues) = validate_record(fields, object) {
            for issue in nested_issues {
                issues.push(FieldIssue::new(
                    key,
                    format!("item {index}, {}: {}", issue.key, issue.message),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckboxOption, NestedRules};
    use serde_json::json;

    fn field(key: &str, required: bool, kind: FieldKind) -> FieldConfig {
        FieldConfig {
            key: key.to_string(),
            name: key.to_string(),
            required,
            kind,
        }
    }

    fn data(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn required_fields_must_be_present() {
        let fields = vec![field(
            "species",
            true,
            FieldKind::Text {
                rules: TextRules::default(),
            },
        )];

        assert!(validate_record(&fields, &Map::new()).is_err());
        assert!(validate_record(&fields, &data(&[("species", json!("oak"))])).is_ok());
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let fields = vec![field(
            "notes",
            false,
            FieldKind::Text {
                rules: TextRules::default(),
            },
        )];
        assert!(validate_record(&fields, &Map::new()).is_ok());
    }

    #[test]
    fn text_length_and_pattern_are_enforced() {
        let fields = vec![field(
            "code",
            true,
            FieldKind::Text {
                rules: TextRules {
                    min_length: Some(2),
                    max_length: Some(4),
                    pattern: Some("^[A-Z]+$".to_string()),
                },
            },
        )];

        assert!(validate_record(&fields, &data(&[("code", json!("AB"))])).is_ok());
        assert!(validate_record(&fields, &data(&[("code", json!("A"))])).is_err());
        assert!(validate_record(&fields, &data(&[("code", json!("ABCDE"))])).is_err());
        assert!(validate_record(&fields, &data(&[("code", json!("ab"))])).is_err());
    }

    #[test]
    fn number_bounds_and_integerness_are_enforced() {
        let fields = vec![field(
            "height",
            true,
            FieldKind::Number {
                rules: NumberRules {
                    min: Some(0.0),
                    max: Some(100.0),
                    step: None,
                    is_float: Some(false),
                },
            },
        )];

        assert!(validate_record(&fields, &data(&[("height", json!(42))])).is_ok());
        assert!(validate_record(&fields, &data(&[("height", json!(-1))])).is_err());
        assert!(validate_record(&fields, &data(&[("height", json!(101))])).is_err());
        assert!(validate_record(&fields, &data(&[("height", json!(1.5))])).is_err());
    }

    #[test]
    fn date_bounds_are_enforced() {
        let fields = vec![field(
            "visited",
            true,
            FieldKind::Date {
                rules: DateRules {
                    min_date: NaiveDate::from_ymd_opt(2024, 1, 1),
                    max_date: NaiveDate::from_ymd_opt(2024, 12, 31),
                },
            },
        )];

        assert!(validate_record(&fields, &data(&[("visited", json!("2024-06-15"))])).is_ok());
        assert!(validate_record(&fields, &data(&[("visited", json!("2023-12-31"))])).is_err());
        assert!(validate_record(&fields, &data(&[("visited", json!("not a date"))])).is_err());
    }

    #[test]
    fn checkbox_membership_and_multiplicity_are_enforced() {
        let fields = vec![field(
            "condition",
            true,
            FieldKind::Checkbox {
                rules: CheckboxRules {
                    options: vec![
                        CheckboxOption {
                            key: "good".to_string(),
                            value: "Good".to_string(),
                        },
                        CheckboxOption {
                            key: "poor".to_string(),
                            value: "Poor".to_string(),
                        },
                    ],
                    multiple: false,
                },
            },
        )];

        assert!(validate_record(&fields, &data(&[("condition", json!("good"))])).is_ok());
        assert!(validate_record(&fields, &data(&[("condition", json!("unknown"))])).is_err());
        assert!(
            validate_record(&fields, &data(&[("condition", json!(["good", "poor"]))])).is_err()
        );
    }

    #[test]
    fn nested_items_validate_one_level_deep() {
        let fields = vec![field(
            "visits",
            false,
            FieldKind::Nested {
                fields: vec![field(
                    "note",
                    true,
                    FieldKind::Text {
                        rules: TextRules::default(),
                    },
                )],
                rules: NestedRules { min_item: Some(1) },
            },
        )];

        assert!(validate_record(&fields, &Map::new()).is_err());
        assert!(validate_record(
            &fields,
            &data(&[("visits", json!([{"note": "first visit"}]))])
        )
        .is_ok());
        assert!(validate_record(&fields, &data(&[("visits", json!([{}]))])).is_err());
    }

    #[test]
    fn deeper_nesting_is_rejected() {
        let inner = field(
            "inner",
            false,
            FieldKind::Nested {
                fields: vec![],
                rules: NestedRules::default(),
            },
        );
        let fields = vec![field(
            "outer",
            false,
            FieldKind::Nested {
                fields: vec![inner],
                rules: NestedRules::default(),
            },
        )];

        let issues = validate_record(&fields, &data(&[("outer", json!([]))])).unwrap_err();
        assert!(issues[0].message.contains("cannot nest further"));
    }
}
