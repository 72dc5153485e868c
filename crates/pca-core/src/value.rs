#![forbid(unsafe_code)]

//! Loosely typed field values.
//!
//! Records coming from the remote store and values typed into forms are
//! both represented as [`serde_json::Value`]. The helpers here give those
//! values the coercion rules the rest of the crate relies on: numeric
//! strings compare as numbers, empty strings count as "no value", and
//! every pair of values has a total order so sorting never panics.

use std::cmp::Ordering;

use serde_json::Value;

/// Field name → value map used for form values, drafts and patches.
pub type Fields = serde_json::Map<String, Value>;

/// Interpret a value as a number.
///
/// Numbers are returned as-is. Strings are trimmed and must parse in full
/// to a finite `f64` (`"12.5"` → 12.5, `"12abc"` → `None`). Everything
/// else is not a number.
#[must_use]
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse a string that must be a number in its entirety.
#[must_use]
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    // `f64::from_str` accepts "inf" and "NaN"; a field value never means those.
    let lowered = trimmed.trim_start_matches(['+', '-']);
    if lowered.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse the longest numeric prefix of `s`, the way number inputs behave
/// when the browser hands over partially typed text (`"12abc"` → 12).
#[must_use]
pub fn parse_number_prefix(s: &str) -> Option<f64> {
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut best = None;
    while end < bytes.len() {
        let c = bytes[end];
        match c {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
                best = Some(end);
            }
            b'.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                end += 1;
            }
            b'e' | b'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                end += 1;
                if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
                    end += 1;
                }
            }
            _ => break,
        }
    }
    best.and_then(|end| trimmed[..end].parse::<f64>().ok())
}

/// `true` for null and for strings that are empty or whitespace only.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// `true` for values that count as "nothing entered": null, `false`, zero
/// and the empty string.
#[must_use]
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Render a value as display text. Integral numbers drop their fraction,
/// null renders as the empty string.
#[must_use]
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over field values used by table sorting.
///
/// Numeric strings are coerced to numbers first, so `"10"` sorts with the
/// numbers. Values of different kinds order as
/// null < bool < number < string < array < object; arrays and objects
/// compare equal among themselves.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let a = coerce_numeric(a);
    let b = coerce_numeric(b);
    match (a.as_ref(), b.as_ref()) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) => rank(x).cmp(&rank(y)),
    }
}

fn coerce_numeric(value: &Value) -> std::borrow::Cow<'_, Value> {
    use std::borrow::Cow;
    if let Value::String(s) = value
        && let Some(n) = parse_number(s).and_then(serde_json::Number::from_f64)
    {
        return Cow::Owned(Value::Number(n));
    }
    Cow::Borrowed(value)
}
