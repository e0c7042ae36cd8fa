//! Loose field access over untyped upstream JSON.
//!
//! Paths are dotted (`"stats.followerCount"`); numeric segments index into
//! arrays (`"thumbnails.0.url"`). Every accessor accepts several candidate
//! paths and returns the first usable hit, which is how renamed upstream
//! fields are tolerated.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::normalize::{parse_count, parse_relative_age};

/// Unix timestamps above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[must_use]
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// First non-null value among `paths`.
#[must_use]
pub fn first_at<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .find_map(|p| get_path(value, p).filter(|v| !v.is_null()))
}

/// Human-readable text from a string or a rich-text object
/// (`simpleText`, `runs[].text`, `content`, `text`).
#[must_use]
pub fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => {
            if let Some(Value::Array(runs)) = map.get("runs") {
                runs.iter()
                    .filter_map(|r| r.get("text").and_then(Value::as_str))
                    .collect::<String>()
                    .trim()
                    .to_string()
            } else {
                return ["simpleText", "content", "text"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(text_of));
            }
        }
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[must_use]
pub fn string_at(value: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find_map(|p| get_path(value, p).and_then(text_of))
}

/// An identifier that upstream may encode as a string or a number.
#[must_use]
pub fn id_at(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| match get_path(value, p)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Non-negative count from a number, a display string, or rich text.
#[must_use]
pub fn count_from_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f > 0.0)
                .map_or(0, |f| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let rounded = f.round() as u64;
                    rounded
                })
        }),
        Value::String(s) => parse_count(s),
        Value::Object(_) => text_of(value).map_or(0, |t| parse_count(&t)),
        _ => 0,
    }
}

/// First path that is present, parsed as a count. `None` when no path exists,
/// so callers can tell "absent" from "zero".
#[must_use]
pub fn count_at(value: &Value, paths: &[&str]) -> Option<u64> {
    first_at(value, paths).map(count_from_value)
}

#[must_use]
pub fn bool_at(value: &Value, paths: &[&str]) -> Option<bool> {
    paths.iter().find_map(|p| match get_path(value, p)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Publish time from unix seconds/milliseconds, RFC 3339, or a relative
/// age label such as `"2 weeks ago"`.
#[must_use]
pub fn timestamp_from_value(value: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(from_unix),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return from_unix(n);
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| parse_relative_age(s, now))
        }
        Value::Object(_) => text_of(value).and_then(|t| parse_relative_age(&t, now)),
        _ => None,
    }
}

#[must_use]
pub fn timestamp_at(value: &Value, paths: &[&str], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    paths
        .iter()
        .find_map(|p| get_path(value, p).and_then(|v| timestamp_from_value(v, now)))
}

fn from_unix(n: i64) -> Option<DateTime<Utc>> {
    if n <= 0 {
        return None;
    }
    if n > MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn get_path_walks_objects_and_arrays() {
        let v = json!({"a": {"list": [{"b": 7}]}});
        assert_eq!(get_path(&v, "a.list.0.b"), Some(&json!(7)));
        assert_eq!(get_path(&v, "a.list.3.b"), None);
        assert_eq!(get_path(&v, "a.missing"), None);
    }

    #[test]
    fn text_of_handles_rich_text_shapes() {
        assert_eq!(text_of(&json!({"simpleText": "Hello"})).as_deref(), Some("Hello"));
        assert_eq!(
            text_of(&json!({"runs": [{"text": "1.2M"}, {"text": " views"}]})).as_deref(),
            Some("1.2M views")
        );
        assert_eq!(text_of(&json!({"content": "x"})).as_deref(), Some("x"));
        assert_eq!(text_of(&json!("   ")), None);
        assert_eq!(text_of(&json!(5)), None);
    }

    #[test]
    fn count_from_value_accepts_numbers_strings_and_text() {
        assert_eq!(count_from_value(&json!(42)), 42);
        assert_eq!(count_from_value(&json!(-3)), 0);
        assert_eq!(count_from_value(&json!(2.6)), 3);
        assert_eq!(count_from_value(&json!("1.2K")), 1200);
        assert_eq!(count_from_value(&json!({"simpleText": "3,401 views"})), 3401);
        assert_eq!(count_from_value(&json!(null)), 0);
    }

    #[test]
    fn count_at_distinguishes_absent_from_zero() {
        let v = json!({"stats": {"followerCount": 0}});
        assert_eq!(count_at(&v, &["stats.followerCount"]), Some(0));
        assert_eq!(count_at(&v, &["stats.fans"]), None);
    }

    #[test]
    fn id_at_accepts_numeric_ids() {
        let v = json!({"pk": 1234567890123_u64, "code": "  "});
        assert_eq!(id_at(&v, &["code", "pk"]).as_deref(), Some("1234567890123"));
    }

    #[test]
    fn timestamp_from_seconds_millis_and_rfc3339() {
        let now = Utc::now();
        let secs = timestamp_from_value(&json!(1_700_000_000), now).unwrap();
        let millis = timestamp_from_value(&json!(1_700_000_000_000_i64), now).unwrap();
        assert_eq!(secs, millis);
        let rfc = timestamp_from_value(&json!("2023-11-14T22:13:20Z"), now).unwrap();
        assert_eq!(rfc, secs);
        assert!(timestamp_from_value(&json!("yesterday-ish"), now).is_none());
    }
}
