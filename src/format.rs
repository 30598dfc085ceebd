//! Value formatter
//!
//! Renders raw values as display text according to a [`FormatSpec`], plus
//! the shared number/text coercions used by the expression evaluator.

use chrono::{DateTime, FixedOffset, Utc};
use schema_types::{FormatKind, FormatSpec};
use serde_json::Value;
use std::fmt::Write;

use crate::config::FormatterConfig;

/// Coerce a JSON value to a number.
///
/// Numbers pass through, numeric strings are parsed (surrounding whitespace
/// ignored), booleans become 1/0. Everything else is non-numeric.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Parse display text as a number. Empty text is not a number.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    match text {
        "" => None,
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => text.parse::<f64>().ok().filter(|n| n.is_finite()),
    }
}

/// Largest precision accepted for fixed-point output
pub const MAX_DECIMALS: usize = 100;

/// Number as display text: integral values without a fraction,
/// non-finite values as `NaN` / `Infinity` / `-Infinity`, exponent form
/// (`1e+21`, `1e-7`) outside `[1e-6, 1e21)`.
pub fn number_to_text(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 {
        // collapses -0
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        exponent_text(n)
    } else {
        n.to_string()
    }
}

fn exponent_text(n: f64) -> String {
    let text = format!("{:e}", n);
    match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => text,
    }
}

/// Fixed-point text with `decimals` fraction digits (capped at
/// [`MAX_DECIMALS`]). Exact ties round away from zero. Non-finite values
/// and magnitudes from `1e21` up use [`number_to_text`].
pub fn to_fixed(n: f64, decimals: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_text(n);
    }
    let decimals = decimals.min(MAX_DECIMALS);
    let magnitude = n.abs();

    let digits = if fraction_bits(magnitude) == decimals + 1 {
        // exactly halfway: the expansion ends in a 5 right after the cut
        let exact = format!("{:.*}", decimals + 1, magnitude);
        let kept = exact[..exact.len() - 1].trim_end_matches('.');
        increment_last_digit(kept)
    } else {
        format!("{:.*}", decimals, magnitude)
    };

    if n < 0.0 {
        format!("-{}", digits)
    } else {
        digits
    }
}

/// Number of binary digits after the point in the exact value of `x`.
/// A value with `k` such digits has exactly `k` decimal fraction digits.
fn fraction_bits(x: f64) -> usize {
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exp) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    if mantissa == 0 {
        return 0;
    }
    let exp = exp + mantissa.trailing_zeros() as i32;
    if exp >= 0 {
        0
    } else {
        exp.unsigned_abs() as usize
    }
}

fn increment_last_digit(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    for i in (0..chars.len()).rev() {
        match chars[i] {
            '.' => {}
            '9' => chars[i] = '0',
            d => {
                chars[i] = (d as u8 + 1) as char;
                return chars.into_iter().collect();
            }
        }
    }
    std::iter::once('1').chain(chars).collect()
}

/// Value as display text. Null renders empty; structures render as JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => number_to_text(f),
            _ => n.to_string(),
        },
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Formats values with a configured timezone and date/time patterns.
#[derive(Debug, Clone, Default)]
pub struct ValueFormatter {
    config: FormatterConfig,
}

impl ValueFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    pub fn format_value(&self, raw: &Value, spec: &FormatSpec) -> String {
        if spec.kind == FormatKind::Other {
            return value_to_text(raw);
        }

        let Some(n) = to_number(raw) else {
            return value_to_text(raw);
        };
        // schema-supplied; std formatting panics on precision above u16::MAX
        let decimals = (spec.decimals.unwrap_or(0) as usize).min(MAX_DECIMALS);

        match spec.kind {
            FormatKind::Number => to_fixed(n, decimals),
            FormatKind::Volume => format_volume(n, decimals),
            FormatKind::Datetime => self
                .format_epoch_millis(n, &self.config.datetime_pattern)
                .unwrap_or_else(|| value_to_text(raw)),
            FormatKind::Time => self
                .format_epoch_millis(n, &self.config.time_pattern)
                .unwrap_or_else(|| value_to_text(raw)),
            FormatKind::Other => value_to_text(raw),
        }
    }

    fn format_epoch_millis(&self, millis: f64, pattern: &str) -> Option<String> {
        if !millis.is_finite() {
            return None;
        }
        let offset = FixedOffset::east_opt(self.config.utc_offset_minutes * 60)?;
        let utc: DateTime<Utc> = DateTime::from_timestamp_millis(millis.trunc() as i64)?;
        let local = utc.with_timezone(&offset);

        // an invalid pattern surfaces as fmt::Error rather than a panic
        let mut out = String::new();
        write!(out, "{}", local.format(pattern)).ok()?;
        Some(out)
    }
}

fn format_volume(n: f64, decimals: usize) -> String {
    let magnitude = n.abs();
    if magnitude >= 1e9 {
        format!("{}B", to_fixed(n / 1e9, decimals))
    } else if magnitude >= 1e6 {
        format!("{}M", to_fixed(n / 1e6, decimals))
    } else if magnitude >= 1e3 {
        format!("{}K", to_fixed(n / 1e3, decimals))
    } else {
        to_fixed(n, decimals)
    }
}

/// Format with the default configuration (UTC, en-US style patterns)
pub fn format_value(raw: &Value, spec: &FormatSpec) -> String {
    ValueFormatter::default().format_value(raw, spec)
}
