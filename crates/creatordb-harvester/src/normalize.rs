//! Count, duration, and age normalization for upstream display strings.
//!
//! Platforms render counters as locale- and suffix-variant text
//! (`"1.2K"`, `"3,4 mil"`, `"987 views"`). Everything here is total: bad
//! input degrades to `0` or `None`, never an error, so a single odd label
//! cannot abort a harvest.

use chrono::{DateTime, Duration, Utc};

/// Longest fractional part honored before the multiplier is applied.
const MAX_FRACTION_DIGITS: usize = 9;

/// Maps a magnitude word (already lowercased) to its multiplier.
fn suffix_multiplier(word: &str) -> Option<u64> {
    match word {
        "k" | "thousand" | "thousands" | "mil" | "tys" => Some(1_000),
        "m" | "mi" | "mln" | "mio" | "million" | "millions" => Some(1_000_000),
        "b" | "bi" | "bn" | "billion" | "billions" => Some(1_000_000_000),
        _ => None,
    }
}

fn is_group_space(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\u{2009}')
}

/// Parses a display count into a non-negative integer.
///
/// With a magnitude suffix (`K`, `M`, `B`, `mil`, `mi`, `bi`, ...) the numeric
/// part's `.` is a decimal mark and `,` a thousands mark, except that a lone
/// `,` followed by one or two digits is read as a decimal comma
/// (`"12,3 mil"` is 12300). Without a suffix every `.` and `,` is a thousands
/// separator, because platform counts are integers.
///
/// Duration-looking input (`"1:23"`) yields `0`; use [`parse_duration_secs`].
#[must_use]
pub fn parse_count(input: &str) -> u64 {
    let lower = input.trim().to_lowercase();
    let chars: Vec<char> = lower.chars().collect();

    let Some(start) = chars.iter().position(char::is_ascii_digit) else {
        return 0;
    };

    let mut end = start;
    while end < chars.len() {
        let c = chars[end];
        let continues = c.is_ascii_digit()
            || ((c == '.' || c == ',')
                && chars.get(end + 1).is_some_and(char::is_ascii_digit))
            || (is_group_space(c)
                && chars[end - 1].is_ascii_digit()
                && chars.get(end + 1).is_some_and(char::is_ascii_digit)
                && chars.get(end + 3).is_some_and(char::is_ascii_digit)
                && !chars.get(end + 4).is_some_and(char::is_ascii_digit));
        if !continues {
            break;
        }
        end += 1;
    }

    if chars.get(end) == Some(&':') && chars.get(end + 1).is_some_and(char::is_ascii_digit) {
        return 0;
    }

    let token: String = chars[start..end]
        .iter()
        .filter(|c| !is_group_space(**c))
        .collect();

    let rest = &chars[end..];
    let word: String = rest
        .iter()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| c.is_alphabetic())
        .collect();

    match suffix_multiplier(&word) {
        Some(multiplier) => scale_decimal(&token, multiplier),
        None => digits_only(&token),
    }
}

fn digits_only(token: &str) -> u64 {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u128>().map_or(0, clamp_u64)
}

fn clamp_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Splits a suffixed mantissa into integer and fractional digits according to
/// the separator rules above, then multiplies with round-half-up.
fn scale_decimal(token: &str, multiplier: u64) -> u64 {
    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');
    let dots = token.matches('.').count();
    let commas = token.matches(',').count();

    let decimal_at = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(d.max(c)),
        (Some(d), None) if dots == 1 => Some(d),
        (None, Some(c)) if commas == 1 => {
            let trailing = token.len() - c - 1;
            (trailing != 3).then_some(c)
        }
        _ => None,
    };

    let (int_part, frac_part) = match decimal_at {
        Some(pos) => (&token[..pos], &token[pos + 1..]),
        None => (token, ""),
    };

    let int_digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    let frac_digits: String = frac_part
        .chars()
        .filter(char::is_ascii_digit)
        .take(MAX_FRACTION_DIGITS)
        .collect();

    let int_value = if int_digits.is_empty() {
        0
    } else {
        match int_digits.parse::<u128>() {
            Ok(v) => v,
            Err(_) => return u64::MAX,
        }
    };
    let frac_value = frac_digits.parse::<u128>().unwrap_or(0);
    let scale = 10_u128.pow(u32::try_from(frac_digits.len()).unwrap_or(0));

    let Some(mantissa) = int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
    else {
        return u64::MAX;
    };
    let scaled = mantissa.saturating_mul(u128::from(multiplier));
    clamp_u64(scaled.saturating_add(scale / 2) / scale)
}

/// Parses `"h:mm:ss"`, `"m:ss"`, or bare seconds into seconds.
///
/// Returns `None` if any component is empty or non-numeric.
#[must_use]
pub fn parse_duration_secs(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed.split(':').try_fold(0_u64, |acc, part| {
        let part = part.trim();
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value = part.parse::<u64>().ok()?;
        acc.checked_mul(60)?.checked_add(value)
    })
}

/// Turns a relative age label (`"3 days ago"`, `"Streamed 1 year ago"`)
/// into an approximate timestamp before `now`.
#[must_use]
pub fn parse_relative_age(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = input.to_lowercase();
    if !lower.contains("ago") {
        return None;
    }

    let mut words = lower.split_whitespace().peekable();
    while let Some(word) = words.next() {
        let Ok(amount) = word.parse::<i64>() else {
            continue;
        };
        let unit = words.peek()?.trim_end_matches('s');
        let delta = match unit {
            "second" | "sec" => Duration::seconds(amount),
            "minute" | "min" => Duration::minutes(amount),
            "hour" | "hr" => Duration::hours(amount),
            "day" => Duration::days(amount),
            "week" => Duration::weeks(amount),
            "month" => Duration::days(amount.saturating_mul(30)),
            "year" => Duration::days(amount.saturating_mul(365)),
            _ => continue,
        };
        return now.checked_sub_signed(delta);
    }
    None
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
