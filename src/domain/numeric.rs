//! Human-readable magnitude parsing ("1.5K", "2.3M", "1B")
//!
//! Ranking pages render counts in abbreviated form, often wrapped in
//! stray symbols. [`normalize`] turns those strings into integers and
//! reports anything it cannot make sense of as `None`.

use tracing::debug;

const PLACEHOLDER: &str = "N/A";

/// Suffix letters in priority order with their multipliers
const SUFFIXES: [(char, f64); 3] = [('B', 1_000_000_000.0), ('M', 1_000_000.0), ('K', 1_000.0)];

/// Parse a magnitude string into an integer.
///
/// Returns `None` for placeholders ("N/A", empty) and for anything that
/// does not parse. The scaled value is truncated, never rounded.
pub fn normalize(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == PLACEHOLDER {
        return None;
    }

    let mut cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'K' | 'M' | 'B' | 'k' | 'm' | 'b'))
        .collect::<String>()
        .to_ascii_uppercase();

    if cleaned.is_empty() {
        return None;
    }

    let mut multiplier = 1.0;
    if let Some((suffix, factor)) = SUFFIXES.iter().find(|(s, _)| cleaned.contains(*s)) {
        multiplier = *factor;
        cleaned = cleaned.replace(*suffix, "");
    }

    let mantissa: f64 = match cleaned.parse() {
        Ok(value) => value,
        Err(e) => {
            debug!("Failed to convert '{}' to numeric: {}", raw, e);
            return None;
        }
    };

    let scaled = (mantissa * multiplier).trunc();
    if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
        debug!("Magnitude '{}' is out of range", raw);
        return None;
    }

    Some(scaled as i64)
}

/// Normalize an optional raw value, treating `None` like a placeholder
pub fn normalize_opt(raw: Option<&str>) -> Option<i64> {
    raw.and_then(normalize)
}
