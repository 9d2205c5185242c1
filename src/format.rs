//! Formatting helpers for presenting metrics.

use num_format::{Locale, ToFormattedString};

pub const NOT_AVAILABLE: &str = "n/a";

pub fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Whole units with thousands separators: `12345.6` → `"12,346"`.
pub fn currency(value: f64) -> String {
    let rounded = value.round() as i64;
    rounded.to_formatted_string(&Locale::en)
}

pub fn months(value: f64) -> String {
    format!("{value:.2} months")
}

/// Scientific notation with a signed two-digit exponent: `"1.23e-04"`.
pub fn p_value(value: f64) -> String {
    let raw = format!("{value:.2e}");
    match raw.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            Err(_) => raw,
        },
        None => raw,
    }
}

pub fn importance(value: f64) -> String {
    format!("{value:.3}")
}

pub fn optional(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value
        .map(render)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
