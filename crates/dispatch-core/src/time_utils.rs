use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Returns the current UTC instant.
///
/// Policy code never calls this directly; callers read the clock once per run and
/// pass the value down.
pub fn current_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Parses an RFC 3339 timestamp (as returned by the GitHub API) into UTC.
pub fn parse_rfc3339_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Fractional days elapsed from `earlier` to `later`. Negative when `later` precedes `earlier`.
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let elapsed = later.signed_duration_since(earlier);
    elapsed.num_milliseconds() as f64 / 1_000.0 / SECONDS_PER_DAY
}
