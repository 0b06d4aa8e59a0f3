//! Daily summaries, per-user history and flat range exports.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::error::{EngineError, StoreResultExt};
use crate::store::AttendanceStore;
use crate::types::{AttendanceEvent, DailyStatus, EventKind, PersonName, UserId, format_duration};
use crate::zone::ReferenceZone;

const DATE_FORMAT: &str = "%d %B %Y";

/// An arrival as shown in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArrivalCell {
    pub time: NaiveTime,
    pub late: bool,
}

impl ArrivalCell {
    fn from_event(zone: ReferenceZone, event: &AttendanceEvent) -> Self {
        Self {
            time: zone.time_of(event.timestamp),
            late: zone.is_late(event.timestamp),
        }
    }
}

/// One person's line in a daily summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub user_id: UserId,
    pub name: String,
    pub arrival: Option<ArrivalCell>,
    pub departure: Option<NaiveTime>,
    pub worked_minutes: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTotals {
    pub people: usize,
    pub arrivals: usize,
    pub departures: usize,
}

/// Everyone's attendance on one date, ordered by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub rows: Vec<SummaryRow>,
    pub totals: SummaryTotals,
}

/// Resolves the name to show for `user_id`, preferring a stored alias.
pub fn display_name<S: AttendanceStore>(
    store: &S,
    user_id: UserId,
    fallback: &PersonName,
) -> Result<String, EngineError> {
    let alias = store.alias(user_id).during("load alias")?;
    Ok(alias.map_or_else(|| fallback.full(), |alias| alias.name.full()))
}

/// Groups the events of `date` by user.
pub fn daily_summary<S: AttendanceStore>(
    store: &S,
    zone: ReferenceZone,
    date: NaiveDate,
) -> Result<DailySummary, EngineError> {
    let events = store.events_on(date).during("load daily events")?;

    let mut by_user: BTreeMap<UserId, Vec<AttendanceEvent>> = BTreeMap::new();
    for event in events {
        by_user.entry(event.user_id).or_default().push(event);
    }

    let mut totals = SummaryTotals {
        people: by_user.len(),
        ..SummaryTotals::default()
    };
    let mut rows = Vec::with_capacity(by_user.len());
    for (user_id, events) in by_user {
        let status = DailyStatus::from_events(events);
        let Some(named) = status.arrival.as_ref().or(status.departure.as_ref()) else {
            continue;
        };
        let name = display_name(store, user_id, &named.name)?;

        if status.has_arrived() {
            totals.arrivals += 1;
        }
        if status.has_departed() {
            totals.departures += 1;
        }
        rows.push(SummaryRow {
            user_id,
            name,
            arrival: status
                .arrival
                .as_ref()
                .map(|event| ArrivalCell::from_event(zone, event)),
            departure: status
                .departure
                .as_ref()
                .map(|event| zone.time_of(event.timestamp)),
            worked_minutes: status.worked().map(|worked| worked.num_minutes()),
        });
    }

    Ok(DailySummary { date, rows, totals })
}

impl fmt::Display for DailySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.date.format(DATE_FORMAT);
        if self.rows.is_empty() {
            return write!(f, "No attendance recorded on {date}.");
        }

        writeln!(f, "Attendance report for {date}")?;
        writeln!(f)?;
        for (index, row) in self.rows.iter().enumerate() {
            writeln!(f, "{}. {}", index + 1, row.name)?;
            writeln!(f, "   Arrival: {}", arrival_text(row.arrival.as_ref()))?;
            writeln!(f, "   Departure: {}", time_text(row.departure))?;
            if let Some(minutes) = row.worked_minutes {
                writeln!(f, "   Worked: {}", format_duration(Duration::minutes(minutes)))?;
            }
            writeln!(f)?;
        }
        writeln!(f, "Summary:")?;
        writeln!(f, "People: {}", self.totals.people)?;
        writeln!(f, "Arrivals: {}", self.totals.arrivals)?;
        write!(f, "Departures: {}", self.totals.departures)
    }
}

/// One raw event in a range export.
///
/// Field names double as CSV column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "User ID")]
    pub user_id: UserId,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "First Name")]
    pub first_name: String,
    #[serde(rename = "Last Name")]
    pub last_name: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Type")]
    pub kind: EventKind,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// Every event dated within `start..=end`, by date then time.
///
/// An inverted range yields no rows.
pub fn range_export<S: AttendanceStore>(
    store: &S,
    zone: ReferenceZone,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ExportRow>, EngineError> {
    if end < start {
        return Ok(Vec::new());
    }
    let mut events = store
        .events_between(start, end)
        .during("load events for export")?;
    events.sort_by_key(|event| (event.date, event.timestamp, event.id));

    Ok(events
        .into_iter()
        .map(|event| {
            let local = zone.local(event.timestamp);
            ExportRow {
                id: event.id,
                user_id: event.user_id,
                username: event.username,
                first_name: event.name.first,
                last_name: event.name.last.unwrap_or_default(),
                date: event.date,
                kind: event.kind,
                time: local.format("%H:%M:%S").to_string(),
                timestamp: local.to_rfc3339(),
            }
        })
        .collect())
}

/// A user's events from the last `window_days` days, newest date first and
/// chronological within a date.
pub fn history<S: AttendanceStore>(
    store: &S,
    zone: ReferenceZone,
    user_id: UserId,
    window_days: u32,
    now: DateTime<Utc>,
) -> Result<Vec<AttendanceEvent>, EngineError> {
    let since = zone.window_start(now, window_days);
    let mut events = store
        .events_for_user_since(user_id, since)
        .during("load attendance history")?;
    events.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
    Ok(events)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub arrival: Option<ArrivalCell>,
    pub departure: Option<NaiveTime>,
}

/// History grouped per day for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryView {
    pub window_days: u32,
    pub days: Vec<HistoryDay>,
    pub total_events: usize,
}

impl HistoryView {
    /// Groups events as returned by [`history`], keeping their day order.
    pub fn new(zone: ReferenceZone, window_days: u32, events: &[AttendanceEvent]) -> Self {
        let mut days: Vec<HistoryDay> = Vec::new();
        for event in events {
            if days.last().is_none_or(|day| day.date != event.date) {
                days.push(HistoryDay {
                    date: event.date,
                    arrival: None,
                    departure: None,
                });
            }
            let Some(day) = days.last_mut() else {
                continue;
            };
            match event.kind {
                EventKind::Arrival => day.arrival = Some(ArrivalCell::from_event(zone, event)),
                EventKind::Departure => day.departure = Some(zone.time_of(event.timestamp)),
            }
        }
        Self {
            window_days,
            days,
            total_events: events.len(),
        }
    }
}

impl fmt::Display for HistoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days.is_empty() {
            return write!(f, "No attendance in the last {} days.", self.window_days);
        }

        writeln!(f, "Attendance history (last {} days)", self.window_days)?;
        writeln!(f)?;
        for (index, day) in self.days.iter().enumerate() {
            writeln!(f, "{}. {}", index + 1, day.date.format(DATE_FORMAT))?;
            writeln!(f, "   Arrival: {}", arrival_text(day.arrival.as_ref()))?;
            writeln!(f, "   Departure: {}", time_text(day.departure))?;
            writeln!(f)?;
        }
        writeln!(f, "Summary:")?;
        writeln!(f, "Days: {}", self.days.len())?;
        write!(f, "Events: {}", self.total_events)
    }
}

fn arrival_text(arrival: Option<&ArrivalCell>) -> String {
    let Some(arrival) = arrival else {
        return "-".to_string();
    };
    let mut text = arrival.time.format("%H:%M").to_string();
    if arrival.late {
        text.push_str(" (late)");
    }
    text
}

fn time_text(time: Option<NaiveTime>) -> String {
    time.map_or_else(|| "-".to_string(), |t| t.format("%H:%M").to_string())
}
