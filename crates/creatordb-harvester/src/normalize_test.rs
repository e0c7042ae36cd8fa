use chrono::TimeZone;

use super::*;

// -----------------------------------------------------------------------
// parse_count
// -----------------------------------------------------------------------

#[test]
fn parse_count_plain_thousands_separator() {
    assert_eq!(parse_count("1,234 views"), 1234);
    assert_eq!(parse_count("1.234.567"), 1_234_567);
    assert_eq!(parse_count("987"), 987);
}

#[test]
fn parse_count_suffix_decimal_point() {
    assert_eq!(parse_count("1.2K"), 1200);
    assert_eq!(parse_count("1.5M followers"), 1_500_000);
    assert_eq!(parse_count("2B"), 2_000_000_000);
    assert_eq!(parse_count("12k"), 12_000);
}

#[test]
fn parse_count_locale_words() {
    assert_eq!(parse_count("12,3 mil"), 12_300);
    assert_eq!(parse_count("3,4 mil"), 3_400);
    assert_eq!(parse_count("2 mi"), 2_000_000);
    assert_eq!(parse_count("1,2 bi"), 1_200_000_000);
    assert_eq!(parse_count("4.7 million subscribers"), 4_700_000);
}

#[test]
fn parse_count_suffix_with_thousands_comma() {
    assert_eq!(parse_count("1,234K"), 1_234_000);
    assert_eq!(parse_count("1,234.5K"), 1_234_500);
}

#[test]
fn parse_count_rounds_half_up() {
    assert_eq!(parse_count("1.2345K"), 1235);
    assert_eq!(parse_count("0.0004K"), 0);
}

#[test]
fn parse_count_grouping_spaces() {
    assert_eq!(parse_count("1 234 567 views"), 1_234_567);
    assert_eq!(parse_count("12\u{a0}345"), 12_345);
}

#[test]
fn parse_count_mantissa_suffix_pairs() {
    let cases: [(&str, &str, u64); 4] = [
        ("1.5", "K", 1_500),
        ("2.25", "M", 2_250_000),
        ("999", "B", 999_000_000_000),
        ("7,5", "mil", 7_500),
    ];
    for (mantissa, suffix, expected) in cases {
        let text = format!("{mantissa}{suffix}");
        assert_eq!(parse_count(&text), expected, "input {text:?}");
        let spaced = format!("{mantissa} {suffix}");
        assert_eq!(parse_count(&spaced), expected, "input {spaced:?}");
    }
}

#[test]
fn parse_count_garbage_is_zero() {
    assert_eq!(parse_count(""), 0);
    assert_eq!(parse_count("no views yet"), 0);
    assert_eq!(parse_count("K"), 0);
}

#[test]
fn parse_count_does_not_read_durations() {
    assert_eq!(parse_count("1:23"), 0);
    assert_eq!(parse_count("12:03:44"), 0);
}

#[test]
fn parse_count_saturates_on_overflow() {
    assert_eq!(parse_count("999999999999999999999999"), u64::MAX);
}

#[test]
fn parse_count_saturates_on_suffixed_overflow() {
    assert_eq!(
        parse_count("99999999999999999999999999999999999999.5K"),
        u64::MAX
    );
    assert_eq!(parse_count("340282366920938463463374607431.5B"), u64::MAX);
    assert_eq!(parse_count("18446744073709551615.9B"), u64::MAX);
}

// -----------------------------------------------------------------------
// parse_duration_secs
// -----------------------------------------------------------------------

#[test]
fn parse_duration_minutes_and_hours() {
    assert_eq!(parse_duration_secs("1:23"), Some(83));
    assert_eq!(parse_duration_secs("1:02:03"), Some(3723));
    assert_eq!(parse_duration_secs("45"), Some(45));
}

#[test]
fn parse_duration_rejects_malformed() {
    assert_eq!(parse_duration_secs(""), None);
    assert_eq!(parse_duration_secs("1::3"), None);
    assert_eq!(parse_duration_secs("1:2a"), None);
}

// -----------------------------------------------------------------------
// parse_relative_age
// -----------------------------------------------------------------------

#[test]
fn parse_relative_age_units() {
    let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
    assert_eq!(
        parse_relative_age("3 days ago", now),
        Some(Utc.with_ymd_and_hms(2024, 6, 7, 12, 0, 0).unwrap())
    );
    assert_eq!(
        parse_relative_age("Streamed 2 hours ago", now),
        Some(Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap())
    );
    assert_eq!(
        parse_relative_age("1 week ago", now),
        Some(Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap())
    );
}

#[test]
fn parse_relative_age_requires_ago() {
    let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
    assert_eq!(parse_relative_age("3 days", now), None);
    assert_eq!(parse_relative_age("ago", now), None);
}
