use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

// ── Bucket keys ───────────────────────────────────────────────────────────────

/// Calendar-month bucket key in UTC, e.g. `"2024-01"`.
pub fn month_key(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m").to_string()
}

/// Calendar-day bucket key in UTC, e.g. `"2024-01-15"`.
pub fn day_key(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Converts stored UTC instants to the user's display timezone.
pub struct TimezoneHandler {
    display_tz: Tz,
}

impl TimezoneHandler {
    /// If `tz_name` is not a recognised IANA timezone, falls back to UTC and
    /// logs a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { display_tz: tz }
    }

    /// Validate that `tz_name` is a recognised IANA timezone identifier.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    pub fn to_local(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.display_tz)
    }

    /// Short date for post and comment metadata, e.g. `"2024-03-01"`.
    pub fn format_date(&self, dt: DateTime<Utc>) -> String {
        self.to_local(dt).format("%Y-%m-%d").to_string()
    }

    /// Date and minute-precision time, e.g. `"2024-03-01 09:30"`.
    pub fn format_datetime(&self, dt: DateTime<Utc>) -> String {
        self.to_local(dt).format("%Y-%m-%d %H:%M").to_string()
    }

    pub fn display_tz(&self) -> Tz {
        self.display_tz
    }
}
