//! Hour bucket key.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar hour in UTC: `(date, hour-of-day)`.
///
/// Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    date: NaiveDate,
    hour: u8,
}

impl BucketKey {
    /// Returns `None` for `hour >= 24`.
    pub fn new(date: NaiveDate, hour: u8) -> Option<Self> {
        (hour < 24).then_some(Self { date, hour })
    }

    /// Bucket containing `ts`.
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        Self {
            date: ts.date_naive(),
            hour: ts.hour() as u8,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Inclusive start of the hour.
    pub fn start(&self) -> DateTime<Utc> {
        let naive = self
            .date
            .and_hms_opt(u32::from(self.hour), 0, 0)
            .unwrap_or_default();
        Utc.from_utc_datetime(&naive)
    }

    /// Exclusive end of the hour.
    pub fn end(&self) -> DateTime<Utc> {
        self.start() + Duration::hours(1)
    }

    pub fn next(&self) -> Self {
        Self::from_timestamp(self.end())
    }

    pub fn prev(&self) -> Self {
        Self::from_timestamp(self.start() - Duration::hours(1))
    }

    /// Same hour-of-day, `days` days earlier.
    pub fn days_before(&self, days: i64) -> Self {
        Self::from_timestamp(self.start() - Duration::days(days))
    }

    /// Keys of every hour whose start lies in `[from, to]`, oldest first.
    pub fn range(from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Self> {
        if to < from {
            return Vec::new();
        }
        let mut key = Self::from_timestamp(from);
        if key.start() < from {
            key = key.next();
        }
        let mut keys = Vec::new();
        while key.start() <= to {
            keys.push(key);
            key = key.next();
        }
        keys
    }

    /// Evening peak: 18:00-23:59.
    pub fn is_peak_hour(&self) -> bool {
        (18..=23).contains(&self.hour)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}:00", self.date, self.hour)
    }
}
