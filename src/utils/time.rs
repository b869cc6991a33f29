use chrono::{DateTime, TimeZone, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses a decimal unix-seconds string such as `1700000000`.
pub fn from_unix_seconds(s: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = s.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}
