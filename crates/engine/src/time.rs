//! Timezone-aware conversions between market-local wall-clock times and
//! the UTC millisecond timestamps the providers speak.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::TimeError;

/// Markets are described in Eastern Time unless they say otherwise.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

pub fn parse_timezone(name: &str) -> Result<Tz, TimeError> {
    name.parse::<Tz>()
        .map_err(|_| TimeError::UnknownTimezone(name.to_string()))
}

/// Interpret `text` as a wall-clock time in `tz` and convert it to UTC.
///
/// Times that fall into a DST gap or overlap are rejected instead of
/// silently picking one side.
pub fn parse_local(text: &str, tz: Tz) -> Result<DateTime<Utc>, TimeError> {
    let text = text.trim();
    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| TimeError::Format(text.to_string()))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, _) => {
            Err(TimeError::Ambiguous(text.to_string(), tz.name().to_string()))
        }
        LocalResult::None => Err(TimeError::Nonexistent(
            text.to_string(),
            tz.name().to_string(),
        )),
    }
}

pub fn parse_date(text: &str) -> Result<NaiveDate, TimeError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| TimeError::Format(text.to_string()))
}

pub fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// SportsDataIO wants dates like `2024-OCT-22`.
pub fn sports_data_date(date: NaiveDate) -> String {
    date.format("%Y-%b-%d").to_string().to_uppercase()
}
