//! Attendance domain types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Unknown attendance kind string.
    #[error("unknown attendance kind: {value}")]
    UnknownKind { value: String },
}

/// Externally assigned numeric identity of a person (e.g. a chat user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which slot of the day an attendance event fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Arrival,
    Departure,
}

impl EventKind {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Arrival => "arrival",
            Self::Departure => "departure",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arrival" => Ok(Self::Arrival),
            "departure" => Ok(Self::Departure),
            _ => Err(ValidationError::UnknownKind {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// First name plus optional last name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

impl PersonName {
    /// Creates a name, treating a blank last name as absent.
    pub fn new(first: impl Into<String>, last: Option<String>) -> Result<Self, ValidationError> {
        let first = first.into();
        if first.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "first name",
            });
        }
        let last = last.filter(|l| !l.trim().is_empty());
        Ok(Self { first, last })
    }

    /// "First Last", or just "First" without a last name.
    pub fn full(&self) -> String {
        match &self.last {
            Some(last) => format!("{} {last}", self.first),
            None => self.first.clone(),
        }
    }
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full())
    }
}

/// Who is submitting a code, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub name: PersonName,
}

/// An attendance event that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendanceEvent {
    pub user_id: UserId,
    pub username: String,
    pub name: PersonName,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    /// Calendar date of `timestamp` in the reference zone.
    pub date: NaiveDate,
}

/// A persisted attendance event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: i64,
    pub user_id: UserId,
    pub username: String,
    pub name: PersonName,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub date: NaiveDate,
}

impl AttendanceEvent {
    pub fn from_new(id: i64, event: NewAttendanceEvent) -> Self {
        Self {
            id,
            user_id: event.user_id,
            username: event.username,
            name: event.name,
            timestamp: event.timestamp,
            kind: event.kind,
            date: event.date,
        }
    }
}

/// A user-chosen display name that overrides the name on events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub user_id: UserId,
    pub name: PersonName,
}

/// One user's attendance for one date, derived from stored events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyStatus {
    pub arrival: Option<AttendanceEvent>,
    pub departure: Option<AttendanceEvent>,
}

impl DailyStatus {
    /// Folds a user's events for a single date into a status.
    pub fn from_events(events: impl IntoIterator<Item = AttendanceEvent>) -> Self {
        let mut status = Self::default();
        for event in events {
            match event.kind {
                EventKind::Arrival => status.arrival = Some(event),
                EventKind::Departure => status.departure = Some(event),
            }
        }
        status
    }

    pub const fn has_arrived(&self) -> bool {
        self.arrival.is_some()
    }

    pub const fn has_departed(&self) -> bool {
        self.departure.is_some()
    }

    /// Time between arrival and departure, when both are recorded.
    pub fn worked(&self) -> Option<Duration> {
        match (&self.arrival, &self.departure) {
            (Some(arrival), Some(departure)) => Some(departure.timestamp - arrival.timestamp),
            _ => None,
        }
    }
}

/// Formats a duration as "Xh Ym", or "Ym" under an hour.
/// Negative durations render as "0m".
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();
    if total_minutes < 0 {
        return "0m".to_string();
    }
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, timestamp: &str) -> AttendanceEvent {
        AttendanceEvent {
            id: 1,
            user_id: UserId::new(7),
            username: "budi".to_string(),
            name: PersonName::new("Budi", None).unwrap(),
            timestamp: DateTime::parse_from_rfc3339(timestamp)
                .unwrap()
                .with_timezone(&Utc),
            kind,
            date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        }
    }

    #[test]
    fn kind_parses_stored_names_only() {
        assert_eq!("arrival".parse::<EventKind>().unwrap(), EventKind::Arrival);
        assert_eq!(
            "departure".parse::<EventKind>().unwrap(),
            EventKind::Departure
        );
        let err = "check_in".parse::<EventKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown attendance kind: check_in");
        let err = "lunch".parse::<EventKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown attendance kind: lunch");
    }

    #[test]
    fn blank_last_name_is_dropped() {
        let name = PersonName::new("Siti", Some("  ".to_string())).unwrap();
        assert_eq!(name.last, None);
        assert_eq!(name.full(), "Siti");

        let name = PersonName::new("Siti", Some("Aminah".to_string())).unwrap();
        assert_eq!(name.full(), "Siti Aminah");
    }

    #[test]
    fn blank_first_name_is_rejected() {
        let err = PersonName::new(" ", None).unwrap_err();
        assert_eq!(err, ValidationError::Empty { field: "first name" });
    }

    #[test]
    fn daily_status_tracks_both_slots() {
        let status = DailyStatus::from_events([
            event(EventKind::Arrival, "2025-01-06T01:55:00Z"),
            event(EventKind::Departure, "2025-01-06T10:30:00Z"),
        ]);
        assert!(status.has_arrived());
        assert!(status.has_departed());
        assert_eq!(status.worked(), Some(Duration::minutes(8 * 60 + 35)));

        let status = DailyStatus::from_events([event(EventKind::Arrival, "2025-01-06T01:55:00Z")]);
        assert!(status.has_arrived());
        assert!(!status.has_departed());
        assert_eq!(status.worked(), None);
    }

    #[test]
    fn format_duration_cases() {
        assert_eq!(format_duration(Duration::minutes(0)), "0m");
        assert_eq!(format_duration(Duration::minutes(59)), "59m");
        assert_eq!(format_duration(Duration::minutes(60)), "1h 0m");
        assert_eq!(format_duration(Duration::minutes(515)), "8h 35m");
        assert_eq!(format_duration(Duration::minutes(-5)), "0m");
    }

    #[test]
    fn event_serializes_kind_as_string() {
        let json = serde_json::to_value(event(EventKind::Departure, "2025-01-06T10:30:00Z")).unwrap();
        assert_eq!(json["kind"], "departure");
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["date"], "2025-01-06");
    }
}
