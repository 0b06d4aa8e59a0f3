//! Mark command: verify a code and record the next event.

use std::io::Write;

use anyhow::Result;
use att_core::{Attendance, AttendanceStore, Identity, MarkOutcome, UserId};
use chrono::{DateTime, Utc};

use super::util;

/// Who is submitting, as given on the command line.
#[derive(Debug, Clone)]
pub struct Submitter<'a> {
    pub user: i64,
    pub first_name: &'a str,
    pub last_name: Option<&'a str>,
    pub username: Option<&'a str>,
}

impl Submitter<'_> {
    fn identity(&self) -> Result<Identity> {
        let username = self
            .username
            .map(util::sanitize_username)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("user_{}", self.user));
        Ok(Identity {
            user_id: UserId::new(self.user),
            username,
            name: util::person_name(self.first_name, self.last_name)?,
        })
    }
}

/// Runs the mark command.
///
/// Rejections are printed like any other reply. Only storage failures error.
pub fn run<W: Write, S: AttendanceStore>(
    writer: &mut W,
    engine: &Attendance<S>,
    submitter: &Submitter<'_>,
    code: &str,
    now: DateTime<Utc>,
) -> Result<MarkOutcome> {
    let identity = submitter.identity()?;
    let outcome = match engine.mark_attendance(&identity, code, now) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(user_id = %identity.user_id, error = %err, "failed to mark attendance");
            return Err(err.into());
        }
    };
    writeln!(writer, "{}", outcome.message())?;
    Ok(outcome)
}
