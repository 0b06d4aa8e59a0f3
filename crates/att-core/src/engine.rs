//! Turns a verified code into the day's next attendance event.
//!
//! Each user moves through three states per calendar date:
//!
//! - no events: the next accepted code records an arrival;
//! - arrived: the next accepted code records a departure;
//! - departed: further codes are rejected until the next date.
//!
//! The store's `(user, date, kind)` uniqueness is the race guard. When two
//! submissions read the same state and both try to insert, the loser's
//! duplicate error is reported as [`Rejection::AlreadyComplete`].

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::error::{EngineError, StoreResultExt};
use crate::store::{AttendanceStore, StoreError};
use crate::totp::{self, Secret};
use crate::types::{
    Alias, AttendanceEvent, DailyStatus, EventKind, Identity, NewAttendanceEvent, PersonName,
    UserId, format_duration,
};
use crate::zone::ReferenceZone;

/// Why a submission did not record anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("Invalid code format. Please send the 6-digit code.")]
    InvalidFormat,
    #[error("The code is invalid or has expired. Please try again with a fresh code.")]
    InvalidOrExpired,
    #[error("Attendance is already complete for today (arrival and departure recorded).")]
    AlreadyComplete,
}

/// A successfully persisted event and what to tell the user about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub event: AttendanceEvent,
    /// Wall-clock time of the event in the reference zone.
    pub local_time: NaiveTime,
    /// Set for arrivals at or after the lateness hour.
    pub late: bool,
    /// Time since arrival, set for departures.
    pub worked: Option<Duration>,
}

/// Result of [`Attendance::mark_attendance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    Recorded(Recorded),
    Rejected(Rejection),
}

impl MarkOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    pub const fn event(&self) -> Option<&AttendanceEvent> {
        match self {
            Self::Recorded(recorded) => Some(&recorded.event),
            Self::Rejected(_) => None,
        }
    }

    /// Human-readable reply for the submitter.
    pub fn message(&self) -> String {
        match self {
            Self::Recorded(recorded) => {
                let time = recorded.local_time.format("%H:%M");
                match recorded.event.kind {
                    EventKind::Arrival if recorded.late => {
                        format!("Arrival recorded at {time} (late).")
                    }
                    EventKind::Arrival => format!("Arrival recorded at {time}."),
                    EventKind::Departure => match recorded.worked {
                        Some(worked) => format!(
                            "Departure recorded at {time}. Worked {}.",
                            format_duration(worked)
                        ),
                        None => format!("Departure recorded at {time}."),
                    },
                }
            }
            Self::Rejected(rejection) => rejection.to_string(),
        }
    }
}

/// Attendance engine bound to a store, a shared secret and a reference zone.
pub struct Attendance<S> {
    store: S,
    secret: Arc<Secret>,
    zone: ReferenceZone,
}

impl<S: AttendanceStore> Attendance<S> {
    pub const fn new(store: S, secret: Arc<Secret>, zone: ReferenceZone) -> Self {
        Self {
            store,
            secret,
            zone,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn zone(&self) -> ReferenceZone {
        self.zone
    }

    /// Verifies `candidate` and records the user's next event for today.
    ///
    /// Format and verification failures and a finished day come back as
    /// [`MarkOutcome::Rejected`]. Only store failures are errors.
    pub fn mark_attendance(
        &self,
        identity: &Identity,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, EngineError> {
        let user_id = identity.user_id;
        if totp::normalize_code(candidate).is_none() {
            tracing::debug!(%user_id, "malformed code submitted");
            return Ok(MarkOutcome::Rejected(Rejection::InvalidFormat));
        }
        if !totp::verify(&self.secret, candidate, now) {
            tracing::warn!(%user_id, "code failed verification");
            return Ok(MarkOutcome::Rejected(Rejection::InvalidOrExpired));
        }

        let date = self.zone.date_of(now);
        let status = status_on(&self.store, user_id, date)?;
        let kind = match (&status.arrival, &status.departure) {
            (None, _) => EventKind::Arrival,
            (Some(_), None) => EventKind::Departure,
            (Some(_), Some(_)) => {
                tracing::debug!(%user_id, %date, "attendance already complete");
                return Ok(MarkOutcome::Rejected(Rejection::AlreadyComplete));
            }
        };

        let new_event = NewAttendanceEvent {
            user_id,
            username: identity.username.clone(),
            name: identity.name.clone(),
            timestamp: now,
            kind,
            date,
        };
        let event = match self.store.insert_event(&new_event) {
            Ok(event) => event,
            Err(StoreError::Duplicate { .. }) => {
                tracing::info!(%user_id, %date, %kind, "concurrent submission already recorded this slot");
                return Ok(MarkOutcome::Rejected(Rejection::AlreadyComplete));
            }
            Err(source) => {
                return Err(EngineError::Persistence {
                    operation: "record attendance",
                    source,
                });
            }
        };
        tracing::info!(%user_id, %date, %kind, id = event.id, "attendance recorded");

        let worked = match kind {
            EventKind::Arrival => None,
            EventKind::Departure => status
                .arrival
                .as_ref()
                .map(|arrival| event.timestamp - arrival.timestamp),
        };
        Ok(MarkOutcome::Recorded(Recorded {
            local_time: self.zone.time_of(event.timestamp),
            late: kind == EventKind::Arrival && self.zone.is_late(event.timestamp),
            worked,
            event,
        }))
    }

    /// Today's status for `user_id`.
    pub fn status(&self, user_id: UserId, now: DateTime<Utc>) -> Result<DailyStatus, EngineError> {
        daily_status(&self.store, self.zone, user_id, now)
    }

    pub fn set_alias(&self, user_id: UserId, name: PersonName) -> Result<Alias, EngineError> {
        set_alias(&self.store, user_id, name)
    }
}

/// Today's status for `user_id`, with "today" taken in `zone`.
pub fn daily_status<S: AttendanceStore>(
    store: &S,
    zone: ReferenceZone,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<DailyStatus, EngineError> {
    status_on(store, user_id, zone.date_of(now))
}

fn status_on<S: AttendanceStore>(
    store: &S,
    user_id: UserId,
    date: NaiveDate,
) -> Result<DailyStatus, EngineError> {
    let events = store
        .events_for_user_on(user_id, date)
        .during("load daily status")?;
    Ok(DailyStatus::from_events(events))
}

/// Stores `name` as the display name for `user_id`, replacing any previous one.
pub fn set_alias<S: AttendanceStore>(
    store: &S,
    user_id: UserId,
    name: PersonName,
) -> Result<Alias, EngineError> {
    let name = PersonName::new(name.first, name.last)?;
    let alias = Alias { user_id, name };
    store.upsert_alias(&alias).during("save alias")?;
    tracing::info!(%user_id, alias = %alias.name, "alias saved");
    Ok(alias)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::MemoryStore;

    const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn secret() -> Arc<Secret> {
        Arc::new(Secret::from_base32(SECRET).unwrap())
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn identity(id: i64) -> Identity {
        Identity {
            user_id: UserId::new(id),
            username: format!("user{id}"),
            name: PersonName::new("Budi", None).unwrap(),
        }
    }

    fn mark<S: AttendanceStore>(
        engine: &Attendance<S>,
        id: i64,
        now: DateTime<Utc>,
    ) -> MarkOutcome {
        let code = totp::derive(&engine.secret, now);
        engine.mark_attendance(&identity(id), &code, now).unwrap()
    }

    #[test]
    fn arrival_then_departure_then_complete() {
        let engine = Attendance::new(MemoryStore::new(), secret(), ReferenceZone::default());

        // 08:55 and 17:30 in Jakarta (UTC+7).
        let arrival = mark(&engine, 42, utc("2025-01-06T01:55:00Z"));
        let MarkOutcome::Recorded(arrival) = arrival else {
            panic!("expected arrival, got {arrival:?}");
        };
        assert_eq!(arrival.event.kind, EventKind::Arrival);
        assert!(!arrival.late);
        assert_eq!(arrival.event.date, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());

        let departure = mark(&engine, 42, utc("2025-01-06T10:30:00Z"));
        assert_eq!(departure.message(), "Departure recorded at 17:30. Worked 8h 35m.");
        let MarkOutcome::Recorded(departure) = departure else {
            panic!("expected departure");
        };
        assert_eq!(departure.event.kind, EventKind::Departure);
        assert_eq!(departure.worked, Some(Duration::minutes(8 * 60 + 35)));

        let third = mark(&engine, 42, utc("2025-01-06T11:00:00Z"));
        assert_eq!(third, MarkOutcome::Rejected(Rejection::AlreadyComplete));
        assert!(!third.is_success());
        assert!(third.event().is_none());

        let stored = engine
            .store()
            .events_for_user_on(UserId::new(42), NaiveDate::from_ymd_opt(2025, 1, 6).unwrap())
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn late_arrival_is_flagged_in_message() {
        let engine = Attendance::new(MemoryStore::new(), secret(), ReferenceZone::default());
        let outcome = mark(&engine, 1, utc("2025-01-06T02:15:00Z"));
        assert_eq!(outcome.message(), "Arrival recorded at 09:15 (late).");

        let on_time = mark(&engine, 2, utc("2025-01-06T01:00:00Z"));
        assert_eq!(on_time.message(), "Arrival recorded at 08:00.");
    }

    #[test]
    fn new_local_day_starts_over() {
        let engine = Attendance::new(MemoryStore::new(), secret(), ReferenceZone::default());
        mark(&engine, 7, utc("2025-01-06T01:00:00Z"));
        mark(&engine, 7, utc("2025-01-06T10:00:00Z"));

        // 17:00 UTC is midnight in Jakarta.
        let next = mark(&engine, 7, utc("2025-01-06T17:00:00Z"));
        let event = next.event().unwrap();
        assert_eq!(event.kind, EventKind::Arrival);
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 7).unwrap());
    }

    #[test]
    fn malformed_and_wrong_codes_are_rejected_without_writes() {
        let engine = Attendance::new(MemoryStore::new(), secret(), ReferenceZone::default());
        let now = utc("2025-01-06T01:00:00Z");

        let outcome = engine.mark_attendance(&identity(1), "12ab56", now).unwrap();
        assert_eq!(outcome, MarkOutcome::Rejected(Rejection::InvalidFormat));
        assert_eq!(
            outcome.message(),
            "Invalid code format. Please send the 6-digit code."
        );

        let stale = totp::derive(&engine.secret, now - Duration::minutes(5));
        let outcome = engine.mark_attendance(&identity(1), &stale, now).unwrap();
        assert_eq!(outcome, MarkOutcome::Rejected(Rejection::InvalidOrExpired));

        assert_eq!(
            engine.status(UserId::new(1), now).unwrap(),
            DailyStatus::default()
        );
    }

    /// Store whose status reads always miss, as if a concurrent writer
    /// inserted between our read and our write.
    struct StaleReads(MemoryStore);

    impl AttendanceStore for StaleReads {
        fn insert_event(&self, event: &NewAttendanceEvent) -> Result<AttendanceEvent, StoreError> {
            self.0.insert_event(event)
        }
        fn events_for_user_on(
            &self,
            _user_id: UserId,
            _date: NaiveDate,
        ) -> Result<Vec<AttendanceEvent>, StoreError> {
            Ok(Vec::new())
        }
        fn events_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, StoreError> {
            self.0.events_on(date)
        }
        fn events_between(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<AttendanceEvent>, StoreError> {
            self.0.events_between(start, end)
        }
        fn events_for_user_since(
            &self,
            user_id: UserId,
            since: NaiveDate,
        ) -> Result<Vec<AttendanceEvent>, StoreError> {
            self.0.events_for_user_since(user_id, since)
        }
        fn upsert_alias(&self, alias: &Alias) -> Result<(), StoreError> {
            self.0.upsert_alias(alias)
        }
        fn alias(&self, user_id: UserId) -> Result<Option<Alias>, StoreError> {
            self.0.alias(user_id)
        }
    }

    #[test]
    fn lost_insert_race_reports_already_complete() {
        let engine = Attendance::new(
            StaleReads(MemoryStore::new()),
            secret(),
            ReferenceZone::default(),
        );
        let first = mark(&engine, 9, utc("2025-01-06T01:00:00Z"));
        assert!(first.is_success());

        let second = mark(&engine, 9, utc("2025-01-06T01:00:10Z"));
        assert_eq!(second, MarkOutcome::Rejected(Rejection::AlreadyComplete));

        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        assert_eq!(engine.store().0.events_on(date).unwrap().len(), 1);
    }

    struct Unavailable;

    impl AttendanceStore for Unavailable {
        fn insert_event(&self, _event: &NewAttendanceEvent) -> Result<AttendanceEvent, StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }
        fn events_for_user_on(
            &self,
            _user_id: UserId,
            _date: NaiveDate,
        ) -> Result<Vec<AttendanceEvent>, StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }
        fn events_on(&self, _date: NaiveDate) -> Result<Vec<AttendanceEvent>, StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }
        fn events_between(
            &self,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<AttendanceEvent>, StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }
        fn events_for_user_since(
            &self,
            _user_id: UserId,
            _since: NaiveDate,
        ) -> Result<Vec<AttendanceEvent>, StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }
        fn upsert_alias(&self, _alias: &Alias) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }
        fn alias(&self, _user_id: UserId) -> Result<Option<Alias>, StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }
    }

    #[test]
    fn store_failures_propagate_with_context() {
        let engine = Attendance::new(Unavailable, secret(), ReferenceZone::default());
        let now = utc("2025-01-06T01:00:00Z");
        let code = totp::derive(&engine.secret, now);

        let err = engine
            .mark_attendance(&identity(1), &code, now)
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to load daily status");
        let EngineError::Persistence { source, .. } = err else {
            panic!("expected persistence error");
        };
        assert_eq!(source.to_string(), "backend error: disk I/O error");

        // Rejections are decided before the store is touched.
        let outcome = engine.mark_attendance(&identity(1), "abc", now).unwrap();
        assert_eq!(outcome, MarkOutcome::Rejected(Rejection::InvalidFormat));
    }

    #[test]
    fn set_alias_validates_and_replaces() {
        let engine = Attendance::new(MemoryStore::new(), secret(), ReferenceZone::default());
        let user = UserId::new(3);

        let alias = engine
            .set_alias(user, PersonName::new("Siti", Some("Aminah".to_string())).unwrap())
            .unwrap();
        assert_eq!(alias.name.full(), "Siti Aminah");

        engine
            .set_alias(user, PersonName::new("Ami", None).unwrap())
            .unwrap();
        let stored = engine.store().alias(user).unwrap().unwrap();
        assert_eq!(stored.name.full(), "Ami");

        let blank = PersonName {
            first: "  ".to_string(),
            last: None,
        };
        let err = engine.set_alias(user, blank).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
