#![forbid(unsafe_code)]

//! pt-BR presentation helpers for numbers, currency and dates.

use chrono::{DateTime, NaiveDate};

/// Non-breaking space used between the currency symbol and the amount.
const NBSP: char = '\u{a0}';

/// Parse a date given either as `YYYY-MM-DD` or as a full RFC 3339
/// timestamp (the date part is kept, in the timestamp's own offset).
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.date_naive());
    }
    // `2026-03-01T00:00:00` without offset, as date inputs sometimes send.
    s.split_once('T')
        .and_then(|(date, _)| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

fn format_fixed(value: f64, min_fraction: usize, max_fraction: usize) -> String {
    let negative = value < 0.0;
    let rendered = format!("{:.*}", max_fraction, value.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((&rendered, ""));
    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < min_fraction {
        frac.push('0');
    }

    let mut out = String::new();
    if negative && (int_part.chars().any(|c| c != '0') || !frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if !frac.is_empty() {
        out.push(',');
        out.push_str(&frac);
    }
    out
}

/// Format a number the way pt-BR locales do: `.` groups thousands, `,`
/// separates up to three fraction digits (`999999999.99` → `999.999.999,99`).
#[must_use]
pub fn format_number_pt_br(value: f64) -> String {
    format_fixed(value, 0, 3)
}

/// Format an amount in reais (`1234.5` → `R$ 1.234,50`).
#[must_use]
pub fn format_currency(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let amount = format_fixed(value.abs(), 2, 2);
    if value < 0.0 && amount.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-R${NBSP}{amount}")
    } else {
        format!("R${NBSP}{amount}")
    }
}

/// Format a date as `dd/mm/yyyy`, or `-` when absent or unreadable.
#[must_use]
pub fn format_date(value: Option<&str>) -> String {
    value
        .and_then(parse_date)
        .map_or_else(|| "-".to_string(), |d| d.format("%d/%m/%Y").to_string())
}

/// Normalize a date to `YYYY-MM-DD`, or the empty string.
#[must_use]
pub fn to_iso_date(value: Option<&str>) -> String {
    value
        .and_then(parse_date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
