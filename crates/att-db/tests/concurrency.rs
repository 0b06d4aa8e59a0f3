use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use att_core::{
    Attendance, AttendanceStore, EventKind, Identity, MarkOutcome, PersonName, ReferenceZone,
    Rejection, Secret, UserId, report, totp,
};
use att_db::Database;
use chrono::{DateTime, Duration, Utc};

const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn secret() -> Arc<Secret> {
    Arc::new(Secret::from_base32(SECRET).unwrap())
}

fn identity(id: i64) -> Identity {
    Identity {
        user_id: UserId::new(id),
        username: format!("user{id}"),
        name: PersonName::new("Budi", Some("Santoso".to_string())).unwrap(),
    }
}

fn engine(path: &Path) -> Attendance<Database> {
    Attendance::new(
        Database::open(path).unwrap(),
        secret(),
        ReferenceZone::default(),
    )
}

#[test]
fn racing_departures_record_exactly_one() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("att.db");
    let user = identity(42);

    let arrival_at = utc("2025-01-06T01:55:00Z");
    let first = engine(&path)
        .mark_attendance(&user, &totp::derive(&secret(), arrival_at), arrival_at)
        .unwrap();
    assert!(first.is_success());

    let departure_at = utc("2025-01-06T10:30:00Z");
    let code = totp::derive(&secret(), departure_at);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let code = code.clone();
            let user = user.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let engine = engine(&path);
                barrier.wait();
                engine.mark_attendance(&user, &code, departure_at).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<MarkOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    assert_eq!(successes, 1, "outcomes: {outcomes:?}");
    assert!(
        outcomes
            .iter()
            .any(|o| *o == MarkOutcome::Rejected(Rejection::AlreadyComplete))
    );

    let db = Database::open(&path).unwrap();
    let events = db
        .events_for_user_on(UserId::new(42), "2025-01-06".parse().unwrap())
        .unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|event| event.kind).collect();
    assert_eq!(kinds, vec![EventKind::Arrival, EventKind::Departure]);
}

#[test]
fn full_day_over_sqlite() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("att.db");
    let engine = engine(&path);
    let user = identity(42);
    let secret = secret();

    let arrival_at = utc("2025-01-06T01:55:00Z");
    let outcome = engine
        .mark_attendance(&user, &totp::derive(&secret, arrival_at), arrival_at)
        .unwrap();
    assert_eq!(outcome.message(), "Arrival recorded at 08:55.");

    let departure_at = utc("2025-01-06T10:30:00Z");
    let outcome = engine
        .mark_attendance(&user, &totp::derive(&secret, departure_at), departure_at)
        .unwrap();
    assert_eq!(
        outcome.message(),
        "Departure recorded at 17:30. Worked 8h 35m."
    );

    let later = departure_at + Duration::minutes(5);
    let outcome = engine
        .mark_attendance(&user, &totp::derive(&secret, later), later)
        .unwrap();
    assert_eq!(outcome, MarkOutcome::Rejected(Rejection::AlreadyComplete));

    let summary =
        report::daily_summary(engine.store(), engine.zone(), "2025-01-06".parse().unwrap())
            .unwrap();
    assert_eq!(summary.totals.people, 1);
    assert_eq!(summary.rows[0].worked_minutes, Some(515));

    let rows = report::range_export(
        engine.store(),
        engine.zone(),
        "2025-01-01".parse().unwrap(),
        "2025-01-31".parse().unwrap(),
    )
    .unwrap();
    let times: Vec<&str> = rows.iter().map(|row| row.time.as_str()).collect();
    assert_eq!(times, vec!["08:55:00", "17:30:00"]);
    assert_eq!(rows[0].timestamp, "2025-01-06T08:55:00+07:00");
}
