use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};

// Parse an age string like "7d", "12h", "30m" or "90s" into a chrono Duration.
// Returns None if unparseable, not positive, or too large to represent.
pub fn parse_age_str(s: &str) -> Option<Duration> {
    let s = s.trim();
    let unit = s.chars().last()?;
    let n = s[..s.len() - unit.len_utf8()].parse::<i64>().ok()?;
    if n <= 0 {
        return None;
    }
    match unit {
        'd' => Duration::try_days(n),
        'h' => Duration::try_hours(n),
        'm' => Duration::try_minutes(n),
        's' => Duration::try_seconds(n),
        _ => None,
    }
}

// Helper for Option<String> inputs used by CLI flags like --max-age
pub fn parse_age_opt(age: &Option<String>) -> Result<Option<Duration>> {
    let Some(s) = age.as_ref() else { return Ok(None) };
    parse_age_str(s)
        .map(Some)
        .ok_or_else(|| anyhow!("invalid age '{s}', expected e.g. 7d, 12h, 30m"))
}

// Feed timestamps: RFC 2822 (RSS pubDate), RFC 3339 (Dublin Core, Atom-ish feeds),
// or a bare YYYY-MM-DD. None if nothing matches.
pub fn parse_feed_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = nd.and_hms_opt(0, 0, 0) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }
    None
}
