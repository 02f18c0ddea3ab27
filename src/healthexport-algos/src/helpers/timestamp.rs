use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Export format, e.g. `2024-01-01 08:00:00 -0500`.
const EXPORT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a timestamp as written in the export.
///
/// Offsets are accepted but not applied: the wall-clock time as written is
/// kept, so a sample is always bucketed to the date printed next to it.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_str(raw, EXPORT_FORMAT) {
        return Some(dt.naive_local());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Parses a numeric attribute. Non-finite values are treated as garbage.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
