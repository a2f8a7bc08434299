//! Date-time normalization for calendar calls.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Expand loose date-time input into RFC 3339.
///
/// Zoned values pass through untouched. `YYYY-MM-DD HH:MM`,
/// `YYYY-MM-DDTHH:MM[:SS]` and `YYYY-MM-DD` become local
/// `YYYY-MM-DDTHH:MM:SS` without an offset. Anything else is returned as is
/// and left for the backend to reject.
pub fn normalize_rfc3339(value: &str) -> String {
    let value = value.trim();
    if has_offset(value) {
        return value.to_string();
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return dt.format("%Y-%m-%dT%H:%M:%S").to_string();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return format!("{}T00:00:00", date.format("%Y-%m-%d"));
    }
    value.to_string()
}

/// Normalize and, when no offset is present, interpret as UTC.
pub fn ensure_zoned(value: &str) -> String {
    let normalized = normalize_rfc3339(value);
    if has_offset(&normalized) {
        normalized
    } else {
        format!("{}Z", normalized)
    }
}

/// Whether the value ends in `Z` or a `+HH:MM`/`-HH:MM` offset.
pub fn has_offset(value: &str) -> bool {
    if value.ends_with('Z') || value.ends_with('z') {
        return true;
    }
    let bytes = value.as_bytes();
    if bytes.len() < 6 {
        return false;
    }
    let tail = &bytes[bytes.len() - 6..];
    (tail[0] == b'+' || tail[0] == b'-')
        && tail[1].is_ascii_digit()
        && tail[2].is_ascii_digit()
        && tail[3] == b':'
        && tail[4].is_ascii_digit()
        && tail[5].is_ascii_digit()
}

/// RFC 3339 in UTC with a `Z` suffix.
pub fn utc_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Default listing window: now until seven days from now.
pub fn default_window(now: DateTime<Utc>) -> (String, String) {
    (utc_rfc3339(now), utc_rfc3339(now + Duration::days(7)))
}

/// Midnight UTC at the start of the previous day.
pub fn start_of_yesterday_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    let yesterday = (now - Duration::days(1)).date_naive();
    yesterday
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// Start and end of the current local day, as zoned RFC 3339.
pub fn today_bounds_local() -> (String, String) {
    let now = Local::now();
    let date = now.date_naive();
    let offset = *now.offset();
    let start = date
        .and_hms_opt(0, 0, 0)
        .and_then(|n| n.and_local_timezone(offset).single());
    let end = date
        .and_hms_opt(23, 59, 59)
        .and_then(|n| n.and_local_timezone(offset).single());
    match (start, end) {
        (Some(s), Some(e)) => (
            s.to_rfc3339_opts(SecondsFormat::Secs, true),
            e.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        _ => default_window(Utc::now()),
    }
}
