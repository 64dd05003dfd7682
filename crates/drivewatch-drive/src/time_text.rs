use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::activity::ActivityTime;

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_instant(at: DateTime<Utc>, timezone: Tz) -> String {
    at.with_timezone(&timezone).format(DISPLAY_FORMAT).to_string()
}

/// Renders an instant as one timestamp and a range as `start - end`.
pub fn format_activity_time(time: &ActivityTime, timezone: Tz) -> String {
    match time {
        ActivityTime::Instant(at) => format_instant(*at, timezone),
        ActivityTime::Range { start, end } => format!(
            "{} - {}",
            format_instant(*start, timezone),
            format_instant(*end, timezone)
        ),
    }
}

/// Card due dates are always written in UTC.
pub fn format_due(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
