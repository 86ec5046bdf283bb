//! Timestamps: creation times, session identifiers, and the relative labels the session list
//! groups by.

use serde::{Deserialize, Deserializer, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::types::Locale;

/// Milliseconds since the Unix epoch.
pub fn unix_millis(at: OffsetDateTime) -> u64 {
    let nanos = at.unix_timestamp_nanos() / 1_000_000;
    u64::try_from(nanos).unwrap_or(0)
}

/// The current time in UTC.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

const MILLIS_PER_DAY: i128 = 86_400_000;

/// Label a date relative to `now` the way the session list groups it.
///
/// Anything within a day is "today", the next day "yesterday", then the last week, the last
/// month, and finally the month name.
pub fn relative_date_label(date: OffsetDateTime, now: OffsetDateTime, locale: Locale) -> String {
    let strings = locale.strings();
    let elapsed = (now - date).abs();
    // Rounded up to whole days, so anything under 24 hours counts as one.
    let days = (elapsed.whole_milliseconds() + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
    match days {
        0 | 1 => strings.today.to_string(),
        2 => strings.yesterday.to_string(),
        3..=7 => strings.previous_7_days.to_string(),
        8..=30 => strings.previous_30_days.to_string(),
        _ => strings.months[usize::from(u8::from(date.month())) - 1].to_string(),
    }
}

/// Serde adapter storing an `OffsetDateTime` as an RFC 3339 string.
pub mod rfc3339 {
    use super::*;

    /// Deserialize an RFC 3339 formatted string into an OffsetDateTime
    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
    }

    /// Serialize an OffsetDateTime into an RFC 3339 formatted string
    pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = datetime
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }
}
