//! Shared helpers for collectors:
//! - Oracle identifier validation for names embedded in SQL text.
//! - Normalisation of instance ids coming back from the driver.

use crate::database::Value;
use once_cell::sync::OnceCell;
use regex::Regex;

/// Check that `name` is an unquoted Oracle identifier (letter first, then
/// letters, digits, `_`, `$` or `#`, at most 128 bytes).
///
/// # Panics
///
/// Panics if the regex cannot be compiled (should never happen).
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^[A-Za-z][A-Za-z0-9_$#]{0,127}$").expect("Invalid regex")
    });

    re.is_match(name)
}

/// Render an instance id as a decimal string, whatever type the driver
/// returned it as. Returns `None` for NULL or blank values.
#[must_use]
pub fn instance_id_string(value: &Value) -> Option<String> {
    let id = match value.clone().sanitize() {
        Value::Null => return None,
        Value::Int(i) => i.to_string(),
        #[allow(clippy::cast_possible_truncation)]
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => (f as i64).to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) | Value::Number(s) => s.trim().to_string(),
    };

    if id.is_empty() { None } else { Some(id) }
}

/// Render a label or entity name column as trimmed text.
#[must_use]
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => {
            let s = other.to_string();
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
    }
}
