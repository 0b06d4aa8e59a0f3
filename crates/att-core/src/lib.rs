//! Core domain logic for OTP-verified attendance.
//!
//! This crate contains the fundamental types and logic for:
//! - Credentials: deriving and verifying time-based one-time codes
//! - Attendance: the per-day arrival/departure sequence
//! - Reports: daily summaries, history and range exports
//!
//! Storage is abstracted behind [`AttendanceStore`]; see `att-db` for the
//! SQLite implementation.

pub mod engine;
mod error;
pub mod report;
pub mod store;
pub mod totp;
mod types;
pub mod zone;

pub use engine::{Attendance, MarkOutcome, Recorded, Rejection, daily_status, set_alias};
pub use error::EngineError;
pub use store::{AttendanceStore, MemoryStore, StoreError};
pub use totp::{Secret, SecretError};
pub use types::{
    Alias, AttendanceEvent, DailyStatus, EventKind, Identity, NewAttendanceEvent, PersonName,
    UserId, ValidationError, format_duration,
};
pub use zone::{ReferenceZone, ZoneError};
