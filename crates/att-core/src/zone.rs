//! Reference timezone for date bucketing and local display.

use std::fmt;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Timezone used when no other is configured.
pub const DEFAULT_ZONE: Tz = chrono_tz::Asia::Jakarta;

/// Arrivals at or after this local hour are flagged late.
pub const LATE_FROM_HOUR: u32 = 9;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown timezone: {name}")]
pub struct ZoneError {
    name: String,
}

/// The fixed timezone all calendar dates and wall-clock times are taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone(Tz);

impl Default for ReferenceZone {
    fn default() -> Self {
        Self(DEFAULT_ZONE)
    }
}

impl ReferenceZone {
    pub const fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Looks up an IANA zone name such as `Asia/Jakarta`.
    pub fn from_name(name: &str) -> Result<Self, ZoneError> {
        name.parse::<Tz>().map(Self).map_err(|_| ZoneError {
            name: name.to_string(),
        })
    }

    pub const fn tz(&self) -> Tz {
        self.0
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.0)
    }

    /// Calendar date of `instant` in this zone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    pub fn time_of(&self, instant: DateTime<Utc>) -> NaiveTime {
        self.local(instant).time()
    }

    /// First date of a trailing window of `days` days ending today.
    ///
    /// Saturates at [`NaiveDate::MIN`].
    pub fn window_start(&self, now: DateTime<Utc>, days: u32) -> NaiveDate {
        self.date_of(now)
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Whether an arrival at `instant` counts as late.
    pub fn is_late(&self, instant: DateTime<Utc>) -> bool {
        self.local(instant).hour() >= LATE_FROM_HOUR
    }
}

impl fmt::Display for ReferenceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}
