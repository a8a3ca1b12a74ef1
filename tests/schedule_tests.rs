use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use regimen::models::{Task, TaskDraft, TaskHistory};
use regimen::notify::NotificationCenter;
use regimen::schedule::{is_done_today, resolve_today, Agenda};
use regimen::storage::MemoryStore;
use regimen::Regimen;

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn task(id: &str, start: DateTime<Utc>, duration: &str) -> Task {
    TaskDraft {
        name: id.into(),
        description: String::new(),
        times: vec!["08:00".into()],
        start_date: start,
        duration: duration.into(),
        color: String::new(),
        reminder_enabled: false,
        current_supply: 10,
        total_supply: 10,
        refill_at: 20,
        refill_reminder: false,
    }
    .into_task(id.into())
}

fn record(task_id: &str, done: bool) -> TaskHistory {
    TaskHistory {
        id: format!("r-{task_id}-{done}"),
        task_id: task_id.into(),
        timestamp: at("2025-04-01T09:00:00Z"),
        done,
    }
}

#[test]
fn test_ongoing_task_due_from_start_onwards() {
    let start = at("2025-01-01T08:00:00Z");
    for duration in ["Ongoing", "-1"] {
        let tasks = vec![task("a", start, duration)];
        assert_eq!(resolve_today(&tasks, start).len(), 1);
        assert_eq!(resolve_today(&tasks, start + Duration::days(4000)).len(), 1);
        assert!(resolve_today(&tasks, start - Duration::seconds(1)).is_empty());
    }
}

#[test]
fn test_three_day_window_is_inclusive_on_both_ends() {
    let d = at("2025-01-01T08:00:00Z");
    let tasks = vec![task("a", d, "3")];

    assert_eq!(resolve_today(&tasks, d).len(), 1);
    assert_eq!(resolve_today(&tasks, d + Duration::days(3)).len(), 1);
    assert!(resolve_today(&tasks, d + Duration::days(3) + Duration::seconds(1)).is_empty());
    assert!(resolve_today(&tasks, d - Duration::seconds(1)).is_empty());
}

#[test]
fn test_window_uses_instants_not_calendar_days() {
    let d = at("2025-01-01T20:00:00Z");
    let tasks = vec![task("a", d, "1 day")];
    // Later on the same calendar day as the end bound, but past it.
    assert!(resolve_today(&tasks, at("2025-01-02T20:00:01Z")).is_empty());
    // Earlier on the start day than the start instant.
    assert!(resolve_today(&tasks, at("2025-01-01T07:00:00Z")).is_empty());
}

#[test]
fn test_malformed_duration_is_never_due() {
    let d = at("2025-01-01T00:00:00Z");
    let tasks = vec![task("bad", d, "soon"), task("ok", d, "5 days")];
    let due = resolve_today(&tasks, d + Duration::hours(1));
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, "ok");
}

#[test]
fn test_done_today_needs_a_done_record() {
    let history = vec![record("a", false), record("a", false), record("a", true), record("b", false)];
    assert!(is_done_today("a", &history));
    assert!(!is_done_today("b", &history));
    assert!(!is_done_today("c", &history));
}

#[test]
fn test_agenda_counts_done_records_against_two_per_task() {
    let d = at("2025-04-01T00:00:00Z");
    let tasks = vec![task("a", d, "Ongoing"), task("b", d, "Ongoing"), task("old", d - Duration::days(30), "2")];
    let history = vec![record("a", true), record("b", false)];

    let agenda = Agenda::build(&tasks, &history, at("2025-04-01T12:00:00Z"));
    assert_eq!(agenda.items.len(), 2);
    assert!(agenda.items[0].done);
    assert!(!agenda.items[1].done);
    assert_eq!(agenda.completed, 1);
    assert_eq!(agenda.expected(), 4);
    assert!((agenda.progress - 0.25).abs() < f64::EPSILON);
}

#[test]
fn test_empty_agenda_has_zero_progress() {
    let agenda = Agenda::build(&[], &[record("a", true)], Utc::now());
    assert!(agenda.items.is_empty());
    assert_eq!(agenda.progress, 0.0);
}

#[tokio::test]
async fn test_engine_agenda_reflects_recorded_doses() {
    let store = Arc::new(MemoryStore::new());
    let engine = Regimen::new(Arc::clone(&store), NotificationCenter::new(Arc::clone(&store), true));
    let now = Utc::now();

    let draft = TaskDraft {
        name: "Vitamin C".into(),
        description: String::new(),
        times: vec!["08:00".into()],
        start_date: now - Duration::hours(1),
        duration: "Ongoing".into(),
        color: String::new(),
        reminder_enabled: false,
        current_supply: 5,
        total_supply: 5,
        refill_at: 20,
        refill_reminder: false,
    };
    let t = engine.add_task(draft, now).await.unwrap();

    let before = engine.agenda(now).await;
    assert_eq!(before.items.len(), 1);
    assert!(!before.items[0].done);

    engine.record_dose(&t.id, true, now).await.unwrap();
    let after = engine.agenda(now).await;
    assert!(after.items[0].done);
    assert_eq!(after.completed, 1);

    // Rebuilding is read-only.
    assert_eq!(engine.agenda(now).await, after);
}

#[tokio::test]
async fn test_agenda_survives_unreadable_store() {
    let store = Arc::new(MemoryStore::new());
    let engine = Regimen::new(Arc::clone(&store), NotificationCenter::new(Arc::clone(&store), true));
    store.set_fail_reads(true);
    let agenda = engine.agenda(Utc::now()).await;
    assert!(agenda.items.is_empty());
    assert_eq!(agenda.progress, 0.0);
}
