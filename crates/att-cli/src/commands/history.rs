//! History command for one user's recent attendance.

use std::io::Write;

use anyhow::{Result, bail};
use att_core::{AttendanceStore, ReferenceZone, UserId, report};
use chrono::{DateTime, Utc};

pub fn run<W: Write, S: AttendanceStore>(
    writer: &mut W,
    store: &S,
    zone: ReferenceZone,
    user_id: UserId,
    days: u32,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let events = report::history(store, zone, user_id, days, now)?;
    let view = report::HistoryView::new(zone, days, &events);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&view)?)?;
    } else {
        writeln!(writer, "{view}")?;
    }
    Ok(())
}
