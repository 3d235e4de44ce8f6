//! Cell value sanitising.
//!
//! The hosted service evaluates any cell whose text starts with a formula
//! trigger. Text headed for a cell gets an apostrophe marker in front of such
//! a trigger, and the marker is stripped again on the way out.

use serde_json::Value;

/// Prefixed to text that would otherwise be evaluated as an expression.
pub const ESCAPE_MARKER: char = '\'';

/// Leading characters the service treats as the start of an expression.
pub const FORMULA_TRIGGERS: &[char] = &['=', '+', '-', '@'];

fn is_trigger(c: char) -> bool {
    FORMULA_TRIGGERS.contains(&c)
}

/// Prepare a value for writing into a cell.
///
/// Numbers and booleans pass through, null becomes an empty string, and text
/// whose first non-whitespace character is a trigger gets exactly one marker.
/// Leading whitespace in front of a trigger is dropped, since reads trim it anyway.
pub fn sanitize_for_write(value: &Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::Number(_) | Value::Bool(_) => value.clone(),
        Value::String(s) => Value::String(sanitize_str(s)),
        // nested structures are stored as their JSON text
        Value::Array(_) | Value::Object(_) => Value::String(sanitize_str(&value.to_string())),
    }
}

/// [`sanitize_for_write`] for plain text.
pub fn sanitize_str(s: &str) -> String {
    let trimmed = s.trim_start();
    match trimmed.chars().next() {
        Some(c) if is_trigger(c) => format!("{}{}", ESCAPE_MARKER, trimmed),
        _ => s.to_string(),
    }
}

/// Decode a cell read back from the service.
///
/// Missing cells and nulls become an empty string, whitespace is trimmed, and
/// a marker directly in front of a trigger is removed.
pub fn unescape_on_read(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    };

    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ESCAPE_MARKER), Some(c)) if is_trigger(c) => text[ESCAPE_MARKER.len_utf8()..].to_string(),
        _ => text,
    }
}
