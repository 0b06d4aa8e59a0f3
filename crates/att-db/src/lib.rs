//! Storage layer for attendance tracking.
//!
//! Provides persistence for attendance events and aliases using `rusqlite`,
//! and implements [`AttendanceStore`] for the engine.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Concurrent submitters should each open their own `Database` on the same file.
//! SQLite serializes their writes, and the `UNIQUE(user_id, date, kind)`
//! constraint decides which of two racing inserts wins. A busy timeout makes
//! writers wait for each other instead of failing with `SQLITE_BUSY`.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC format with millisecond
//! precision (e.g., `2025-01-06T01:55:00.000Z`), so lexicographic ordering
//! matches chronological ordering.
//!
//! ## Dates
//!
//! The `date` column is the calendar date (`YYYY-MM-DD`) of the timestamp in
//! the reference zone, computed by the engine at write time. All date-range
//! queries filter on this column, never on the timestamp.

use std::path::Path;
use std::time::Duration;

use att_core::{
    Alias, AttendanceEvent, AttendanceStore, EventKind, NewAttendanceEvent, PersonName,
    StoreError, UserId,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use thiserror::Error;

/// How long a writer waits for a competing connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_COLUMNS: &str =
    "id, user_id, username, first_name, last_name, timestamp, kind, date";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The `(user_id, date, kind)` slot is already taken.
    #[error("{kind} already recorded for user {user_id} on {date}")]
    Duplicate {
        user_id: UserId,
        date: NaiveDate,
        kind: EventKind,
    },
    /// Failed to parse an event timestamp.
    #[error("invalid timestamp for event {event_id}: {timestamp}")]
    TimestampParse {
        event_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored column value.
    #[error("invalid event data for {event_id}: {message}")]
    InvalidEventData { event_id: i64, message: String },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate {
                user_id,
                date,
                kind,
            } => Self::Duplicate {
                user_id,
                date,
                kind,
            },
            other => Self::Backend(Box::new(other)),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// An attendance row as stored, before parsing.
struct EventRow {
    id: i64,
    user_id: i64,
    username: String,
    first_name: String,
    last_name: Option<String>,
    timestamp: String,
    kind: String,
    date: String,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Attendance events: at most one arrival and one departure per user per date
            -- timestamp: RFC 3339 UTC (e.g., '2025-01-06T01:55:00.000Z')
            -- date: calendar date in the reference zone (e.g., '2025-01-06')
            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('arrival', 'departure')),
                date TEXT NOT NULL,
                UNIQUE (user_id, date, kind)
            );

            CREATE INDEX IF NOT EXISTS idx_attendance_user_date ON attendance(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date);

            CREATE TABLE IF NOT EXISTS alias (
                user_id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts an event, failing with [`DbError::Duplicate`] if its slot is taken.
    pub fn insert_event(&self, event: &NewAttendanceEvent) -> Result<AttendanceEvent, DbError> {
        let result = self.conn.execute(
            "
            INSERT INTO attendance (user_id, username, first_name, last_name, timestamp, kind, date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                event.user_id.get(),
                event.username,
                event.name.first,
                event.name.last,
                format_timestamp(event.timestamp),
                event.kind.as_str(),
                event.date.to_string(),
            ],
        );
        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(DbError::Duplicate {
                    user_id: event.user_id,
                    date: event.date,
                    kind: event.kind,
                });
            }
            Err(err) => return Err(err.into()),
        }
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, user_id = %event.user_id, kind = %event.kind, "inserted attendance event");
        Ok(AttendanceEvent::from_new(id, event.clone()))
    }

    /// Lists one user's events on a date.
    pub fn events_for_user_on(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, DbError> {
        self.query_events(
            "user_id = ? AND date = ?",
            params![user_id.get(), date.to_string()],
        )
    }

    /// Lists all events on a date.
    pub fn events_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, DbError> {
        self.query_events("date = ?", params![date.to_string()])
    }

    /// Lists events dated within a range.
    ///
    /// The range is inclusive of both `start` and `end`.
    pub fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, DbError> {
        if end < start {
            return Ok(Vec::new());
        }
        self.query_events(
            "date BETWEEN ? AND ?",
            params![start.to_string(), end.to_string()],
        )
    }

    /// Lists one user's events dated on or after `since`.
    pub fn events_for_user_since(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, DbError> {
        self.query_events(
            "user_id = ? AND date >= ?",
            params![user_id.get(), since.to_string()],
        )
    }

    /// Creates or replaces a user's alias.
    pub fn upsert_alias(&self, alias: &Alias) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO alias (user_id, first_name, last_name)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name
            ",
            params![alias.user_id.get(), alias.name.first, alias.name.last],
        )?;
        Ok(())
    }

    /// Looks up a user's alias.
    pub fn alias(&self, user_id: UserId) -> Result<Option<Alias>, DbError> {
        let alias = self
            .conn
            .query_row(
                "SELECT first_name, last_name FROM alias WHERE user_id = ?",
                [user_id.get()],
                |row| {
                    Ok(PersonName {
                        first: row.get(0)?,
                        last: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(alias.map(|name| Alias { user_id, name }))
    }

    /// Runs an attendance query ordered by date, then timestamp.
    fn query_events(
        &self,
        filter: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<AttendanceEvent>, DbError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM attendance WHERE {filter} ORDER BY date ASC, timestamp ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(EventRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                username: row.get(2)?,
                first_name: row.get(3)?,
                last_name: row.get(4)?,
                timestamp: row.get(5)?,
                kind: row.get(6)?,
                date: row.get(7)?,
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(parse_event(row?)?);
        }
        tracing::debug!(filter, count = events.len(), "queried attendance events");
        Ok(events)
    }
}

impl AttendanceStore for Database {
    fn insert_event(&self, event: &NewAttendanceEvent) -> Result<AttendanceEvent, StoreError> {
        Ok(Self::insert_event(self, event)?)
    }

    fn events_for_user_on(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(Self::events_for_user_on(self, user_id, date)?)
    }

    fn events_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(Self::events_on(self, date)?)
    }

    fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(Self::events_between(self, start, end)?)
    }

    fn events_for_user_since(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(Self::events_for_user_since(self, user_id, since)?)
    }

    fn upsert_alias(&self, alias: &Alias) -> Result<(), StoreError> {
        Ok(Self::upsert_alias(self, alias)?)
    }

    fn alias(&self, user_id: UserId) -> Result<Option<Alias>, StoreError> {
        Ok(Self::alias(self, user_id)?)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn parse_event(row: EventRow) -> Result<AttendanceEvent, DbError> {
    let timestamp = parse_timestamp(&row.timestamp, row.id)?;
    let kind: EventKind = row.kind.parse().map_err(|err: att_core::ValidationError| {
        DbError::InvalidEventData {
            event_id: row.id,
            message: err.to_string(),
        }
    })?;
    let date = row
        .date
        .parse::<NaiveDate>()
        .map_err(|err| DbError::InvalidEventData {
            event_id: row.id,
            message: format!("invalid date {}: {err}", row.date),
        })?;
    Ok(AttendanceEvent {
        id: row.id,
        user_id: UserId::new(row.user_id),
        username: row.username,
        name: PersonName {
            first: row.first_name,
            last: row.last_name,
        },
        timestamp,
        kind,
        date,
    })
}

fn parse_timestamp(timestamp: &str, event_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            event_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
