//! Report command for the daily attendance summary.

use std::io::Write;

use anyhow::Result;
use att_core::{AttendanceStore, ReferenceZone, report};
use chrono::{DateTime, Utc};

use super::util;

pub fn run<W: Write, S: AttendanceStore>(
    writer: &mut W,
    store: &S,
    zone: ReferenceZone,
    date: Option<&str>,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let date = util::date_or_today(date, zone, now)?;
    let summary = report::daily_summary(store, zone, date)?;
    tracing::debug!(%date, people = summary.totals.people, "built daily summary");

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else {
        writeln!(writer, "{summary}")?;
    }
    Ok(())
}
