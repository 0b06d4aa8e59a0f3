//! Status command for showing today's attendance of one user.

use std::io::Write;

use anyhow::Result;
use att_core::{
    AttendanceStore, DailyStatus, ReferenceZone, UserId, daily_status, format_duration, report,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct StatusOutput {
    user_id: UserId,
    name: Option<String>,
    date: NaiveDate,
    arrival: Option<NaiveTime>,
    late: bool,
    departure: Option<NaiveTime>,
    worked_minutes: Option<i64>,
}

impl StatusOutput {
    fn new(
        user_id: UserId,
        name: Option<String>,
        zone: ReferenceZone,
        date: NaiveDate,
        status: &DailyStatus,
    ) -> Self {
        Self {
            user_id,
            name,
            date,
            arrival: status.arrival.as_ref().map(|e| zone.time_of(e.timestamp)),
            late: status.arrival.as_ref().is_some_and(|e| zone.is_late(e.timestamp)),
            departure: status.departure.as_ref().map(|e| zone.time_of(e.timestamp)),
            worked_minutes: status.worked().map(|worked| worked.num_minutes()),
        }
    }
}

pub fn run<W: Write, S: AttendanceStore>(
    writer: &mut W,
    store: &S,
    zone: ReferenceZone,
    user_id: UserId,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let status = daily_status(store, zone, user_id, now)?;
    let name = match status.arrival.as_ref().or(status.departure.as_ref()) {
        Some(event) => Some(report::display_name(store, user_id, &event.name)?),
        None => store.alias(user_id)?.map(|alias| alias.name.full()),
    };
    let output = StatusOutput::new(user_id, name, zone, zone.date_of(now), &status);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    let who = output
        .name
        .clone()
        .unwrap_or_else(|| format!("user {user_id}"));
    writeln!(
        writer,
        "Attendance for {who} on {}",
        output.date.format("%d %B %Y")
    )?;
    match output.arrival {
        Some(time) if output.late => writeln!(writer, "Arrival: {} (late)", time.format("%H:%M"))?,
        Some(time) => writeln!(writer, "Arrival: {}", time.format("%H:%M"))?,
        None => writeln!(writer, "Arrival: -")?,
    }
    match output.departure {
        Some(time) => writeln!(writer, "Departure: {}", time.format("%H:%M"))?,
        None => writeln!(writer, "Departure: -")?,
    }
    if let Some(worked) = status.worked() {
        writeln!(writer, "Worked: {}", format_duration(worked))?;
    }
    Ok(())
}
