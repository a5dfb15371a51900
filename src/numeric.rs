//! Shorthand Numeric Parser
//!
//! Converts engagement-count text such as "1.2K", "3M" or "12,345" into
//! integers. Nothing here panics or errors; unreadable input is `None`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SHORTHAND_RE: Regex = Regex::new(r"^(\d*)(?:\.(\d*))?\s*([kKmM]?)$").unwrap();
    static ref COUNT_TOKEN_RE: Regex = Regex::new(r"([\d,.]+[kKmM]?)").unwrap();
}

/// Parse a shorthand count ("1.2K" -> 1200, "3M" -> 3000000, "12,345" -> 12345).
///
/// Fractions are truncated after scaling, computed on the decimal digits
/// directly so "1.15K" is 1150 and not 1149.
pub fn shorthand_to_int(text: &str) -> Option<u64> {
    let cleaned = text.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(caps) = SHORTHAND_RE.captures(cleaned) {
        let whole = caps.get(1).map_or("", |m| m.as_str());
        let fraction = caps.get(2).map_or("", |m| m.as_str());
        let suffix = caps.get(3).map_or("", |m| m.as_str());

        if !whole.is_empty() || !fraction.is_empty() {
            let precision = match suffix {
                "k" | "K" => 3,
                "m" | "M" => 6,
                _ => 0,
            };
            return scale_decimal(whole, fraction, precision);
        }
    }

    digits_only(cleaned)
}

/// Find the first shorthand token in free text ("1.2K Likes. Like") and parse it.
pub fn parse_count_from_text(text: &str) -> Option<u64> {
    if text.trim().is_empty() {
        return None;
    }
    COUNT_TOKEN_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| shorthand_to_int(m.as_str()))
}

fn scale_decimal(whole: &str, fraction: &str, precision: usize) -> Option<u64> {
    let whole_value: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let scale = 10u64.pow(precision as u32);

    let mut fraction_digits: String = fraction.chars().take(precision).collect();
    while fraction_digits.len() < precision {
        fraction_digits.push('0');
    }
    let fraction_value: u64 = if fraction_digits.is_empty() {
        0
    } else {
        fraction_digits.parse().ok()?
    };

    whole_value.checked_mul(scale)?.checked_add(fraction_value)
}

fn digits_only(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
