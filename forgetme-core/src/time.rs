//! Time utilities: calendar date keys, weekday labels and timezone-aware
//! local time construction.
//!
//! Everything that buckets state by "day" goes through `DateKey`, which is a
//! local calendar date and never an instant.

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse an IANA tz like "America/Chicago".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Resolve a local wall-clock time to UTC.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// DST gap do not exist and yield `None`.
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Last representable instant of a local day (23:59:59.999).
pub fn end_of_day(tz: Tz, day: DateKey) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    let local = day.date().and_time(last);
    tz.from_local_datetime(&local)
        .latest()
        .map(|dt| dt.with_timezone(&Utc))
        // 23:59 never falls in a real-world DST gap; fall back to next midnight anyway.
        .unwrap_or_else(|| {
            let next = day.date().succ_opt().unwrap_or(day.date()).and_time(NaiveTime::MIN);
            Utc.from_utc_datetime(&next)
        })
}

/// Local calendar date used to bucket triggers and completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Local date of `instant` in `tz`.
    pub fn of(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self(instant.with_timezone(&tz).date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn weekday(&self) -> Day {
        Day::from(self.0.weekday())
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map(Self)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Weekday label as stored on a task (`Sun`..`Sat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Sun,
        Day::Mon,
        Day::Tue,
        Day::Wed,
        Day::Thu,
        Day::Fri,
        Day::Sat,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Day::Sun => "Sun",
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
            Day::Sat => "Sat",
        }
    }
}

impl From<Weekday> for Day {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Sun => Day::Sun,
            Weekday::Mon => Day::Mon,
            Weekday::Tue => Day::Tue,
            Weekday::Wed => Day::Wed,
            Weekday::Thu => Day::Thu,
            Weekday::Fri => Day::Fri,
            Weekday::Sat => Day::Sat,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Day {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Day::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| anyhow::anyhow!("invalid day label: {s} (expected Sun..Sat)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_key_uses_local_date_not_utc() {
        // 03:30 UTC on the 17th is still the evening of the 16th in Chicago.
        let tz = parse_timezone("America/Chicago").unwrap();
        let instant = Utc.with_ymd_and_hms(2026, 2, 17, 3, 30, 0).unwrap();
        assert_eq!(DateKey::of(instant, tz).to_string(), "2026-02-16");
        assert_eq!(DateKey::of(instant, tz).weekday(), Day::Mon);
    }

    #[test]
    fn date_key_serializes_as_plain_string() {
        let key: DateKey = "2026-02-16".parse().unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2026-02-16\"");
    }

    #[test]
    fn end_of_day_is_last_local_millisecond() {
        let tz = parse_timezone("America/Chicago").unwrap();
        let key: DateKey = "2026-02-16".parse().unwrap();
        let eod = end_of_day(tz, key).with_timezone(&tz);
        assert_eq!(eod.format("%H:%M:%S%.3f").to_string(), "23:59:59.999");
    }

    #[test]
    fn day_labels_parse_case_insensitively() {
        assert_eq!("wed".parse::<Day>().unwrap(), Day::Wed);
        assert!("Funday".parse::<Day>().is_err());
    }

    #[test]
    fn dst_gap_has_no_instant() {
        // 2026-03-08 02:30 does not exist in Chicago.
        let tz = parse_timezone("America/Chicago").unwrap();
        let gap = NaiveDate::from_ymd_opt(2026, 3, 8)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert!(local_to_utc(tz, gap).is_none());
    }
}
