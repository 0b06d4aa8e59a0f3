//! Persistence contract for attendance events and aliases.
//!
//! Backends (e.g. `att-db`) implement [`AttendanceStore`] so the engine and
//! reports don't depend on any database. The one consistency rule a backend
//! must enforce itself is uniqueness of `(user, date, kind)`: a second insert
//! for the same triple fails with [`StoreError::Duplicate`] no matter how
//! many callers race.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{Alias, AttendanceEvent, EventKind, NewAttendanceEvent, UserId};

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An event already exists for this user, date and kind.
    #[error("{kind} already recorded for user {user_id} on {date}")]
    Duplicate {
        user_id: UserId,
        date: NaiveDate,
        kind: EventKind,
    },
    /// The backend failed; the original error is kept as the source.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Storage operations needed by the engine and reports.
///
/// Every query returns events ordered by date, then timestamp, ascending.
pub trait AttendanceStore {
    fn insert_event(&self, event: &NewAttendanceEvent) -> Result<AttendanceEvent, StoreError>;

    fn events_for_user_on(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError>;

    fn events_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, StoreError>;

    /// Events dated within `start..=end`.
    fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError>;

    /// Events for one user dated on or after `since`.
    fn events_for_user_since(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError>;

    /// Creates or wholesale replaces a user's alias.
    fn upsert_alias(&self, alias: &Alias) -> Result<(), StoreError>;

    fn alias(&self, user_id: UserId) -> Result<Option<Alias>, StoreError>;
}

impl<S: AttendanceStore + ?Sized> AttendanceStore for &S {
    fn insert_event(&self, event: &NewAttendanceEvent) -> Result<AttendanceEvent, StoreError> {
        (**self).insert_event(event)
    }

    fn events_for_user_on(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        (**self).events_for_user_on(user_id, date)
    }

    fn events_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, StoreError> {
        (**self).events_on(date)
    }

    fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        (**self).events_between(start, end)
    }

    fn events_for_user_since(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        (**self).events_for_user_since(user_id, since)
    }

    fn upsert_alias(&self, alias: &Alias) -> Result<(), StoreError> {
        (**self).upsert_alias(alias)
    }

    fn alias(&self, user_id: UserId) -> Result<Option<Alias>, StoreError> {
        (**self).alias(user_id)
    }
}

/// In-process store backed by a mutex-guarded vector.
///
/// Enforces the same uniqueness rule as the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    events: Vec<AttendanceEvent>,
    aliases: Vec<Alias>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn select(&self, predicate: impl Fn(&AttendanceEvent) -> bool) -> Vec<AttendanceEvent> {
        let mut events: Vec<_> = self
            .state()
            .events
            .iter()
            .filter(|event| predicate(event))
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.date, event.timestamp, event.id));
        events
    }
}

impl AttendanceStore for MemoryStore {
    fn insert_event(&self, event: &NewAttendanceEvent) -> Result<AttendanceEvent, StoreError> {
        let mut state = self.state();
        let exists = state.events.iter().any(|existing| {
            existing.user_id == event.user_id
                && existing.date == event.date
                && existing.kind == event.kind
        });
        if exists {
            return Err(StoreError::Duplicate {
                user_id: event.user_id,
                date: event.date,
                kind: event.kind,
            });
        }
        state.next_id += 1;
        let stored = AttendanceEvent::from_new(state.next_id, event.clone());
        state.events.push(stored.clone());
        Ok(stored)
    }

    fn events_for_user_on(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(self.select(|event| event.user_id == user_id && event.date == date))
    }

    fn events_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(self.select(|event| event.date == date))
    }

    fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(self.select(|event| event.date >= start && event.date <= end))
    }

    fn events_for_user_since(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(self.select(|event| event.user_id == user_id && event.date >= since))
    }

    fn upsert_alias(&self, alias: &Alias) -> Result<(), StoreError> {
        let mut state = self.state();
        match state
            .aliases
            .iter_mut()
            .find(|existing| existing.user_id == alias.user_id)
        {
            Some(existing) => *existing = alias.clone(),
            None => state.aliases.push(alias.clone()),
        }
        Ok(())
    }

    fn alias(&self, user_id: UserId) -> Result<Option<Alias>, StoreError> {
        Ok(self
            .state()
            .aliases
            .iter()
            .find(|alias| alias.user_id == user_id)
            .cloned())
    }
}
