//! Declarative shape validation for untyped input records.
//!
//! # Responsibility
//! - Turn a `serde_json::Value` into a typed entity input or a full list of
//!   field violations.
//! - Share field rules between untyped parsing and typed `validate()` calls.
//!
//! # Invariants
//! - Every field is checked before failing; one violation per field.
//! - Nested paths are joined with `.` (`spaces.0.items.1.price`).
//! - A successful parse never carries a violation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$")
        .expect("valid email regex")
});

pub(crate) const REQUIRED: &str = "Required";
pub(crate) const INVALID_EMAIL: &str = "Invalid email address";
pub(crate) const NOT_POSITIVE: &str = "Number must be greater than 0";
const BELOW_ZERO: &str = "Number must be greater than or equal to 0";
const ABOVE_HUNDRED: &str = "Number must be less than or equal to 100";
const INVALID_UUID: &str = "Invalid uuid";

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dot-joined path of the offending field.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

/// Validation failure carrying every offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Builds an error from a non-empty violation list.
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    /// Builds an error with a single violation.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldViolation {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Offending field paths in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.violations
            .iter()
            .map(|violation| violation.field.as_str())
            .collect()
    }

    /// Returns the message reported for `field`, if any.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.violations
            .iter()
            .find(|violation| violation.field == field)
            .map(|violation| violation.message.as_str())
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let lines = self
            .violations
            .iter()
            .map(|violation| format!("{}: {}", violation.field, violation.message))
            .collect::<Vec<_>>();
        write!(f, "{}", lines.join("\n"))
    }
}

impl Error for ValidationError {}

/// Entity shape that can be parsed from an untyped record.
pub trait Schema: Sized {
    /// Parses a record rooted at `path` (empty for top-level records).
    fn parse_at(value: &Value, path: &str) -> Result<Self, ValidationError>;

    /// Re-checks a typed value against the same field rules.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Parses a top-level record.
    fn parse(value: &Value) -> Result<Self, ValidationError> {
        Self::parse_at(value, "")
    }
}

/// String-backed enumeration accepted by the validator.
pub trait EnumField: Sized + Copy + 'static {
    const VARIANTS: &'static [(&'static str, Self)];

    fn as_str(self) -> &'static str;

    fn parse_str(value: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, variant)| *variant)
    }
}

/// Returns `(field, message)` pairs for display surfaces.
pub fn format_validation_errors(error: &ValidationError) -> Vec<(String, String)> {
    error
        .violations()
        .iter()
        .map(|violation| (violation.field.clone(), violation.message.clone()))
        .collect()
}

pub(crate) fn check_non_empty(value: &str, message: &str) -> Option<String> {
    if value.is_empty() {
        Some(message.to_string())
    } else {
        None
    }
}

pub(crate) fn check_email(value: &str) -> Option<String> {
    let well_formed =
        !value.starts_with('.') && !value.contains("..") && EMAIL_RE.is_match(value);
    if well_formed {
        None
    } else {
        Some(INVALID_EMAIL.to_string())
    }
}

pub(crate) fn check_positive(value: f64, message: &str) -> Option<String> {
    if value.is_finite() && value > 0.0 {
        None
    } else {
        Some(message.to_string())
    }
}

/// NaN is reported as below range; infinities by sign.
pub(crate) fn check_percentage(value: f64) -> Option<String> {
    if value.is_nan() || value < 0.0 {
        Some(BELOW_ZERO.to_string())
    } else if value > 100.0 {
        Some(ABOVE_HUNDRED.to_string())
    } else {
        None
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

/// Collects violations for typed `validate()` implementations.
#[derive(Debug, Default)]
pub(crate) struct ViolationSink {
    violations: Vec<FieldViolation>,
}

impl ViolationSink {
    pub(crate) fn check(&mut self, field: &str, outcome: Option<String>) {
        if let Some(message) = outcome {
            self.violations.push(FieldViolation {
                field: field.to_string(),
                message,
            });
        }
    }

    /// Merges violations from a nested record under `prefix`.
    pub(crate) fn absorb(&mut self, prefix: &str, nested: ValidationError) {
        self.violations
            .extend(nested.violations.into_iter().map(|violation| FieldViolation {
                field: join_path(prefix, &violation.field),
                message: violation.message,
            }));
    }

    pub(crate) fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.violations))
        }
    }
}

/// Field-by-field reader over one JSON object.
///
/// Each accessor records at most one violation for its field. On violation
/// it returns a placeholder value; callers must call [`ObjectReader::finish`]
/// before using anything they read, so placeholders never escape.
pub(crate) struct ObjectReader<'a> {
    object: Option<&'a Map<String, Value>>,
    prefix: String,
    violations: Vec<FieldViolation>,
}

impl<'a> ObjectReader<'a> {
    pub(crate) fn new(value: &'a Value, prefix: &str) -> Self {
        let mut reader = Self {
            object: value.as_object(),
            prefix: prefix.to_string(),
            violations: Vec::new(),
        };
        if reader.object.is_none() {
            let message = format!("Expected object, received {}", json_type_name(value));
            reader.violations.push(FieldViolation {
                field: prefix.to_string(),
                message,
            });
        }
        reader
    }

    pub(crate) fn path(&self, field: &str) -> String {
        join_path(&self.prefix, field)
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        let field = self.path(field);
        self.violations.push(FieldViolation {
            field,
            message: message.into(),
        });
    }

    /// Returns the raw field. A non-object root was already reported once,
    /// so per-field checks are skipped for it.
    fn present(&mut self, field: &str, required: bool) -> Option<&'a Value> {
        let object = self.object?;
        let value = object.get(field);
        if value.is_none() && required {
            self.push(field, REQUIRED);
        }
        value
    }

    fn typed_str(&mut self, field: &str, value: &'a Value) -> Option<&'a str> {
        if let Some(text) = value.as_str() {
            return Some(text);
        }
        let message = format!("Expected string, received {}", json_type_name(value));
        self.push(field, message);
        None
    }

    fn typed_number(&mut self, field: &str, value: &Value) -> Option<f64> {
        if let Some(number) = value.as_f64() {
            return Some(number);
        }
        let message = format!("Expected number, received {}", json_type_name(value));
        self.push(field, message);
        None
    }

    fn record(&mut self, field: &str, outcome: Option<String>) {
        if let Some(message) = outcome {
            self.push(field, message);
        }
    }

    /// Required string with a minimum length of one.
    pub(crate) fn non_empty_string(&mut self, field: &str, empty_message: &str) -> String {
        let Some(value) = self.present(field, true) else {
            return String::new();
        };
        let Some(text) = self.typed_str(field, value) else {
            return String::new();
        };
        self.record(field, check_non_empty(text, empty_message));
        text.to_string()
    }

    pub(crate) fn email(&mut self, field: &str) -> String {
        let Some(value) = self.present(field, true) else {
            return String::new();
        };
        let Some(text) = self.typed_str(field, value) else {
            return String::new();
        };
        self.record(field, check_email(text));
        text.to_string()
    }

    pub(crate) fn uuid(&mut self, field: &str) -> Uuid {
        let Some(value) = self.present(field, true) else {
            return Uuid::nil();
        };
        let Some(text) = self.typed_str(field, value) else {
            return Uuid::nil();
        };
        match Uuid::parse_str(text) {
            Ok(id) => id,
            Err(_) => {
                self.push(field, INVALID_UUID);
                Uuid::nil()
            }
        }
    }

    pub(crate) fn positive_number(&mut self, field: &str, message: &str) -> f64 {
        let Some(value) = self.present(field, true) else {
            return 0.0;
        };
        let Some(number) = self.typed_number(field, value) else {
            return 0.0;
        };
        self.record(field, check_positive(number, message));
        number
    }

    pub(crate) fn optional_positive_number(&mut self, field: &str) -> Option<f64> {
        let value = self.present(field, false)?;
        let number = self.typed_number(field, value)?;
        self.record(field, check_positive(number, NOT_POSITIVE));
        Some(number)
    }

    pub(crate) fn percentage(&mut self, field: &str) -> f64 {
        let Some(value) = self.present(field, true) else {
            return 0.0;
        };
        let Some(number) = self.typed_number(field, value) else {
            return 0.0;
        };
        self.record(field, check_percentage(number));
        number
    }

    pub(crate) fn optional_percentage(&mut self, field: &str) -> Option<f64> {
        let value = self.present(field, false)?;
        let number = self.typed_number(field, value)?;
        self.record(field, check_percentage(number));
        Some(number)
    }

    pub(crate) fn optional_enum<T: EnumField>(&mut self, field: &str) -> Option<T> {
        let value = self.present(field, false)?;
        let text = self.typed_str(field, value)?;
        let parsed = T::parse_str(text);
        if parsed.is_none() {
            let expected = T::VARIANTS
                .iter()
                .map(|(name, _)| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(" | ");
            self.push(
                field,
                format!("Invalid enum value. Expected {expected}, received '{text}'"),
            );
        }
        parsed
    }

    /// Enum field that falls back to `default` when absent.
    pub(crate) fn enum_or<T: EnumField>(&mut self, field: &str, default: T) -> T {
        self.optional_enum(field).unwrap_or(default)
    }

    /// Optional array; absent or mistyped yields an empty slice.
    pub(crate) fn optional_array(&mut self, field: &str) -> &'a [Value] {
        let Some(value) = self.present(field, false) else {
            return &[];
        };
        match value.as_array() {
            Some(items) => items.as_slice(),
            None => {
                let message = format!("Expected array, received {}", json_type_name(value));
                self.push(field, message);
                &[]
            }
        }
    }

    /// Merges violations reported by a nested parser.
    pub(crate) fn absorb(&mut self, nested: ValidationError) {
        self.violations.extend(nested.violations);
    }

    pub(crate) fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        check_email, check_percentage, check_positive, ObjectReader, ABOVE_HUNDRED, BELOW_ZERO,
        NOT_POSITIVE,
    };
    use serde_json::json;

    #[test]
    fn email_rule_matches_common_shapes() {
        assert!(check_email("sales@example.com").is_none());
        assert!(check_email("first.last+tag@sub.example.co").is_none());
        assert!(check_email("bad-email").is_some());
        assert!(check_email(".lead@example.com").is_some());
        assert!(check_email("a..b@example.com").is_some());
        assert!(check_email("user@localhost").is_some());
    }

    #[test]
    fn percentage_rule_accepts_closed_interval() {
        assert!(check_percentage(0.0).is_none());
        assert!(check_percentage(100.0).is_none());
        assert!(check_percentage(-0.01).is_some());
        assert!(check_percentage(100.01).is_some());
        assert_eq!(check_percentage(f64::NAN).as_deref(), Some(BELOW_ZERO));
        assert_eq!(check_percentage(f64::INFINITY).as_deref(), Some(ABOVE_HUNDRED));
        assert_eq!(check_percentage(f64::NEG_INFINITY).as_deref(), Some(BELOW_ZERO));
    }

    #[test]
    fn positive_rule_rejects_zero() {
        assert!(check_positive(0.0, NOT_POSITIVE).is_some());
        assert!(check_positive(-1.0, NOT_POSITIVE).is_some());
        assert!(check_positive(0.01, NOT_POSITIVE).is_none());
        assert!(check_positive(f64::NAN, NOT_POSITIVE).is_some());
        assert!(check_positive(f64::INFINITY, NOT_POSITIVE).is_some());
    }

    #[test]
    fn reader_reports_missing_and_mistyped_fields_with_prefix() {
        let value = json!({ "amount": "12" });
        let mut reader = ObjectReader::new(&value, "receipts.0");
        reader.positive_number("amount", NOT_POSITIVE);
        reader.percentage("payment_percentage");

        let err = reader.finish().unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["receipts.0.amount", "receipts.0.payment_percentage"]
        );
        assert_eq!(
            err.message_for("receipts.0.amount"),
            Some("Expected number, received string")
        );
        assert_eq!(
            err.message_for("receipts.0.payment_percentage"),
            Some("Required")
        );
    }

    #[test]
    fn reader_rejects_non_object_root_once() {
        let value = json!([1, 2]);
        let mut reader = ObjectReader::new(&value, "");
        assert_eq!(reader.non_empty_string("name", "Required"), "");
        let err = reader.finish().unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].message, "Expected object, received array");
    }
}
