//! Best-effort coercion of raw CSV cells. Nothing in here fails: a value that
//! cannot be interpreted comes back as `None` and the caller decides what null means.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Cell values that load as null, matching what spreadsheet exports emit for "no value".
pub const NULL_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>",
    "#N/A", "#NA", "#N/A N/A", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

pub fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw.trim())
}

/// Parse a finite number. `"nan"`, `"inf"` and friends are null, not numbers.
pub fn parse_number(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim().parse().ok()?;
    v.is_finite().then_some(v)
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a timestamp as a UTC instant. Values without an offset are taken as UTC;
/// a bare date is midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Trailing "Z" after a space-separated time is not RFC 3339 but shows up in exports.
    let s_offset = match s.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => s.to_string(),
    };
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&s_offset, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse the date component of a date or timestamp cell. Any time part is discarded.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    parse_timestamp(s).map(|ts| ts.date_naive())
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

/// Normalize a join key so `"7"`, `" 7 "` and `"7.0"` compare equal. Blank keys never match.
pub fn normalize_key(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(v) = parse_number(s) {
        if v.fract() == 0.0 && v.abs() < 1e15 && s.contains('.') {
            return Some(format!("{}", v as i64));
        }
    }
    Some(s.to_string())
}

pub fn render_instant(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S+00:00").to_string()
}

pub fn render_local(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn render_bool(v: bool) -> String {
    if v { "true" } else { "false" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn numbers_coerce_or_null() {
        assert_eq!(parse_number("100"), Some(100.0));
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn timestamp_formats() {
        let a = parse_timestamp("2024-03-10T08:15:00Z").unwrap();
        let b = parse_timestamp("2024-03-10 08:15:00").unwrap();
        let c = parse_timestamp("2024-03-10 15:15:00+07:00").unwrap();
        let d = parse_timestamp("2024-03-10 08:15:00.000Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, d);

        let date_only = parse_timestamp("2024-03-10").unwrap();
        assert_eq!((date_only.year(), date_only.month(), date_only.day()), (2024, 3, 10));
        assert_eq!(date_only.hour(), 0);
    }

    #[test]
    fn bad_timestamp_is_null() {
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("2024-13-40 00:00:00").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn date_component_only() {
        assert_eq!(parse_date("2025-01-31"), NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(parse_date("2025-01-31 23:59:59"), NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(parse_date("garbage"), None);
    }

    #[test]
    fn bools() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0.0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn key_normalization() {
        assert_eq!(normalize_key("7"), Some("7".into()));
        assert_eq!(normalize_key("7.0"), Some("7".into()));
        assert_eq!(normalize_key(" abc "), Some("abc".into()));
        assert_eq!(normalize_key("7.5"), Some("7.5".into()));
        assert_eq!(normalize_key("   "), None);
    }

    #[test]
    fn null_tokens() {
        assert!(is_null_token(""));
        assert!(is_null_token(" NaN "));
        assert!(is_null_token("NULL"));
        assert!(!is_null_token("0"));
    }
}
