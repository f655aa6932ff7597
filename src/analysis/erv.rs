//! ERV (engagement revenue value) parsing and money formatting.
//!
//! ERV values arrive as Brazilian-style currency strings:
//!
//! ```text
//! erv      := ws* [symbol] ws* digits ws*
//! digits   := group ("." group)* ["," fraction]
//! ```
//!
//! Every `.` is a thousands separator and `,` is the decimal separator.
//! Anything that does not reduce to a finite number is worth `0.0`.

use serde_json::Value;

/// Currency symbol stripped from ERV strings and used when formatting.
pub const DEFAULT_CURRENCY_SYMBOL: &str = "R$";

/// Parse an ERV string, removing `symbol` wherever it appears.
pub fn parse_erv_with_symbol(raw: &str, symbol: &str) -> f64 {
    let mut cleaned = raw.to_string();
    if !symbol.is_empty() {
        cleaned = cleaned.replace(symbol, "");
    }
    let cleaned = cleaned.replace('.', "").replace(',', ".");

    match cleaned.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// ERV of a raw JSON value: strings are parsed, numbers taken as-is,
/// anything else (including absence) is zero.
pub fn erv_from_value(value: Option<&Value>, symbol: &str) -> f64 {
    match value {
        Some(Value::String(s)) => parse_erv_with_symbol(s, symbol),
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Format a monetary value as `"R$ 1.234.567,89"`.
pub fn format_money(value: f64, symbol: &str) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let negative = value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0');
    let sign = if negative { "-" } else { "" };

    if symbol.is_empty() {
        format!("{}{},{}", sign, grouped, frac_part)
    } else {
        format!("{} {}{},{}", symbol, sign, grouped, frac_part)
    }
}
