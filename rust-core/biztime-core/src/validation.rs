//! # Validation Module
//!
//! Field validation and sanitization applied to every client value before it
//! reaches storage.
//!
//! Sanitization runs first: [`sanitize_input`] strips everything outside
//! letters, digits, whitespace and `-`, and the validators only ever see the
//! sanitized text. A value such as `"ab!"` therefore fails the `code` check
//! as a two-character code, not as one with a bad character.

use crate::error::Error;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Upper bound applied to every raw string parameter
pub const MAX_PARAM_LENGTH: usize = 2048;

/// Maximum stored description length
pub const MAX_DESCRIPTION_LENGTH: usize = 255;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing or blank
    Required,
    /// Value is invalid type
    InvalidType,
    /// Value is too long
    TooLong,
    /// Value is zero or negative where a positive number is required
    TooSmall,
    /// Value doesn't match pattern
    InvalidFormat,
    /// Field tag is not one we know how to validate
    UnknownField,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name (e.g., "code", "amt")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "cannot be empty" error
    pub fn required(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("Invalid {field_str}: cannot be empty"),
            field: field_str,
            code: ValidationCode::Required,
        }
    }

    /// Create an "invalid type" error
    pub fn invalid_type(field: impl Into<String>, label: &str, expected: &str) -> Self {
        Self {
            field: field.into(),
            message: format!("{label} must be {expected}."),
            code: ValidationCode::InvalidType,
        }
    }

    /// Create a "too long" error
    pub fn too_long(field: impl Into<String>, label: &str, max: usize) -> Self {
        Self {
            field: field.into(),
            message: format!("{label} has a max length of {max}."),
            code: ValidationCode::TooLong,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FieldError {}

impl From<FieldError> for Error {
    fn from(err: FieldError) -> Self {
        Self::validation(err.message)
    }
}

/// Fields with format rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Company code
    Code,
    /// Company name
    Name,
    /// Company description
    Description,
}

impl Field {
    /// Parse a field tag; `None` for tags without rules
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "code" => Some(Self::Code),
            "name" => Some(Self::Name),
            "description" => Some(Self::Description),
            _ => None,
        }
    }

    /// Body/parameter key of this field
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Name => "name",
            Self::Description => "description",
        }
    }

    /// Capitalized name for messages
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Code => "Code",
            Self::Name => "Name",
            Self::Description => "Description",
        }
    }

    /// Check a value against this field's rules
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] describing the first rule the value breaks.
    pub fn validate(self, value: &str) -> Result<(), FieldError> {
        if value.trim().is_empty() {
            return Err(FieldError::required(self.tag()));
        }

        match self {
            Self::Code if !code_pattern().is_match(value) => Err(FieldError::new(
                self.tag(),
                "Invalid code: must be 3-10 alphanumeric characters",
                ValidationCode::InvalidFormat,
            )),
            Self::Name if !name_pattern().is_match(value) => Err(FieldError::new(
                self.tag(),
                "Invalid name: must contain only letters, numbers, spaces, and hyphens",
                ValidationCode::InvalidFormat,
            )),
            Self::Description if value.chars().count() > MAX_DESCRIPTION_LENGTH => {
                Err(FieldError::new(
                    self.tag(),
                    format!(
                        "Invalid description: exceeds maximum length of {MAX_DESCRIPTION_LENGTH} characters"
                    ),
                    ValidationCode::TooLong,
                ))
            }
            _ => Ok(()),
        }
    }
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{3,10}$").expect("valid code regex"))
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9\s-]+$").expect("valid name regex"))
}

/// Validate a value for the field named by `tag`
///
/// Blank values are rejected for every field, and an unrecognized tag is
/// always an error.
///
/// # Errors
///
/// Returns a [`FieldError`] when the value or the tag is invalid.
pub fn validate_input(value: &str, tag: &str) -> Result<(), FieldError> {
    match Field::from_tag(tag) {
        Some(field) => field.validate(value),
        None => Err(FieldError::new(
            tag,
            format!("Invalid field: {tag}"),
            ValidationCode::UnknownField,
        )),
    }
}

/// Strip every character outside `[A-Za-z0-9\s-]`
#[must_use]
pub fn sanitize_input(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect()
}

/// Sanitize JSON strings; any other JSON value passes through unchanged
#[must_use]
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_input(s)),
        other => other.clone(),
    }
}

/// Reject strings longer than [`MAX_PARAM_LENGTH`]
///
/// # Errors
///
/// Returns a `TooLong` [`FieldError`].
pub fn check_length(value: &str, tag: &str, label: &str) -> Result<(), FieldError> {
    if value.chars().count() > MAX_PARAM_LENGTH {
        return Err(FieldError::too_long(tag, label, MAX_PARAM_LENGTH));
    }
    Ok(())
}

/// Sanitize and validate a required string field from a JSON body
///
/// # Errors
///
/// Returns a [`FieldError`] when the value is missing, not a string, too
/// long, or breaks the field's format rule.
pub fn clean_field(raw: Option<&Value>, field: Field) -> Result<String, FieldError> {
    let value = match raw.map(sanitize_value) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => {
            return Err(FieldError::new(
                field.tag(),
                format!("{} must have an input.", field.label()),
                ValidationCode::Required,
            ))
        }
        Some(_) => return Err(FieldError::invalid_type(field.tag(), field.label(), "a string")),
    };
    check_length(&value, field.tag(), field.label())?;
    field.validate(&value)?;
    Ok(value)
}

/// Sanitize a path parameter and bound it to 1..=2048 characters
///
/// # Errors
///
/// Returns a [`FieldError`] for empty or oversized values.
pub fn clean_param(raw: &str, tag: &str, label: &str) -> Result<String, FieldError> {
    let value = sanitize_input(raw);
    if value.is_empty() {
        return Err(FieldError::new(
            tag,
            format!("{label} must have an input."),
            ValidationCode::Required,
        ));
    }
    check_length(&value, tag, label)?;
    Ok(value)
}

/// Parse a numeric invoice id from a path parameter
///
/// # Errors
///
/// Returns an `InvalidType` [`FieldError`] for anything that is not an
/// integer after sanitization.
pub fn parse_id(raw: &str) -> Result<i32, FieldError> {
    let value = clean_param(raw, "id", "Invoice ID")?;
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| FieldError::invalid_type("id", "Invoice ID", "a number"))
}

/// Parse a positive amount from a JSON number or numeric string
///
/// Numeric strings are trimmed but not sanitized, since sanitizing would
/// drop the decimal point.
///
/// # Errors
///
/// Returns a [`FieldError`] when the amount is missing, not numeric, not
/// finite, or not greater than zero.
pub fn parse_amount(raw: Option<&Value>) -> Result<f64, FieldError> {
    let amount = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        Some(Value::String(_) | Value::Null) | None => {
            return Err(FieldError::new(
                "amt",
                "Amount value must have a valid input.",
                ValidationCode::Required,
            ))
        }
        Some(_) => None,
    };

    match amount {
        Some(a) if a.is_finite() && a > 0.0 => Ok(a),
        Some(a) if a.is_finite() => Err(FieldError::new(
            "amt",
            "Amount must be greater than 0.",
            ValidationCode::TooSmall,
        )),
        _ => Err(FieldError::invalid_type("amt", "Amount", "a number")),
    }
}
