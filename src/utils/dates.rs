use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

static TZ: OnceLock<Tz> = OnceLock::new();

/// Set the timezone dates are displayed in. Only the first call has any effect.
pub fn set_timezone(tz: Tz) {
    let _ = TZ.set(tz);
}

/// Format a UTC timestamp in the site's local timezone with a `strftime` format string.
pub fn format(date: &DateTime<Utc>, format: &str) -> String {
    let tz = TZ.get().copied().unwrap_or(Tz::UTC);
    date.with_timezone(&tz).format(format).to_string()
}

/// e.g. `March 1, 2025`
pub fn long(date: &DateTime<Utc>) -> String {
    format(date, "%B %-d, %Y")
}

/// e.g. `2025-03-01 14:05`
pub fn short(date: &DateTime<Utc>) -> String {
    format(date, "%Y-%m-%d %H:%M")
}
