use std::env;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use regimen::commands::*;
use regimen::notify::{NotificationCenter, NotificationService};
use regimen::storage::JsonFileStore;
use regimen::{Error, Regimen};

type Engine = Regimen<JsonFileStore, NotificationCenter<JsonFileStore>>;

fn open(dir: &PathBuf) -> Engine {
    let store = Arc::new(JsonFileStore::new(dir.clone()));
    Regimen::new(Arc::clone(&store), NotificationCenter::new(store, true))
}

/// Runs `f` against an engine over a fresh data directory, removed afterwards.
async fn with_test_db<F, Fut>(test_name: &str, f: F)
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut dir = env::temp_dir();
    dir.push(format!("regimen_test_{}_{}", test_name, uuid::Uuid::new_v4()));
    f(dir.clone()).await;
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
}

fn add_args(name: &str) -> AddArgs {
    AddArgs {
        name: name.into(),
        times: vec!["08:00".into(), "20:00".into()],
        total: 30,
        ..AddArgs::default()
    }
}

#[tokio::test]
async fn test_add_and_list() {
    with_test_db("add_list", |dir| async move {
        let engine = open(&dir);
        engine.start(Utc::now()).await;
        let task = cmd_add(&engine, add_args("Metformin"), 20, Utc::now(), true).await.unwrap();

        assert!(dir.join("tasks.json").exists());
        let tasks = open(&dir).tasks().list().await;
        assert_eq!(tasks, vec![task.clone()]);
        assert_eq!(tasks[0].duration, "Ongoing");
        assert_eq!(tasks[0].current_supply, 30);
        assert_eq!(tasks[0].refill_at, 20);
        assert!(dir.join("notifications.json").exists());
    })
    .await;
}

#[tokio::test]
async fn test_add_with_course_length_and_start() {
    with_test_db("course", |dir| async move {
        let engine = open(&dir);
        let mut args = add_args("Amoxicillin");
        args.days = Some(10);
        args.start = Some("2025-06-01T09:00:00Z".into());
        args.supply = Some(12);
        let task = cmd_add(&engine, args, 20, Utc::now(), true).await.unwrap();

        assert_eq!(task.duration, "10 days");
        assert_eq!(task.start_date, "2025-06-01T09:00:00Z".parse::<chrono::DateTime<Utc>>().unwrap());
        assert_eq!(task.current_supply, 12);
    })
    .await;
}

#[tokio::test]
async fn test_add_rejects_bad_time() {
    with_test_db("bad_time", |dir| async move {
        let engine = open(&dir);
        let mut args = add_args("Bad");
        args.times = vec!["8am".into()];
        let res = cmd_add(&engine, args, 20, Utc::now(), true).await;
        assert!(matches!(res, Err(Error::InvalidTaskState(_))));
        assert!(engine.tasks().list().await.is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_take_and_skip_by_prefix() {
    with_test_db("take", |dir| async move {
        let engine = open(&dir);
        let now = Utc::now();
        let task = cmd_add(&engine, add_args("Aspirin"), 20, now - Duration::hours(1), true).await.unwrap();
        let prefix = &task.id[..8];

        cmd_record(&engine, prefix, true, now, true).await.unwrap();
        cmd_record(&engine, prefix, false, now, true).await.unwrap();

        let engine = open(&dir);
        assert_eq!(engine.tasks().get(&task.id).await.unwrap().current_supply, 29);
        assert_eq!(engine.history().list_all().await.len(), 2);
        let agenda = engine.agenda(now).await;
        assert!(agenda.items[0].done);
    })
    .await;
}

#[tokio::test]
async fn test_unknown_id_is_reported() {
    with_test_db("unknown", |dir| async move {
        let engine = open(&dir);
        let res = cmd_record(&engine, "nope", true, Utc::now(), true).await;
        assert!(matches!(res, Err(Error::TaskNotFound(_))));
    })
    .await;
}

#[tokio::test]
async fn test_edit_task() {
    with_test_db("edit", |dir| async move {
        let engine = open(&dir);
        engine.start(Utc::now()).await;
        let task = cmd_add(&engine, add_args("Old"), 20, Utc::now(), true).await.unwrap();

        let args = EditArgs {
            name: Some("New".into()),
            times: vec!["06:45".into()],
            days: Some(5),
            supply: Some(100),
            ..EditArgs::default()
        };
        let updated = cmd_edit(&engine, &task.id, args, Utc::now(), true).await.unwrap();

        assert_eq!(updated.name, "New");
        assert_eq!(updated.times, vec!["06:45".to_string()]);
        assert_eq!(updated.duration, "5 days");
        // Clamped to the total.
        assert_eq!(updated.current_supply, 30);
        let reminders = open(&dir);
        reminders.start(Utc::now()).await;
        let scheduled = reminders.reminders().service().list_scheduled().await.unwrap();
        assert_eq!(scheduled.len(), 1);
    })
    .await;
}

#[tokio::test]
async fn test_refill_and_remove() {
    with_test_db("refill", |dir| async move {
        let engine = open(&dir);
        let mut args = add_args("Iron");
        args.supply = Some(3);
        let task = cmd_add(&engine, args, 20, Utc::now(), true).await.unwrap();

        cmd_refill(&engine, &task.id, Utc::now(), true).await.unwrap();
        let refilled = engine.tasks().get(&task.id).await.unwrap();
        assert_eq!(refilled.current_supply, 30);
        assert!(refilled.last_refill_date.is_some());

        cmd_remove(&engine, &task.id, true).await.unwrap();
        assert!(engine.tasks().list().await.is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_reset_removes_data_files() {
    with_test_db("reset", |dir| async move {
        let engine = open(&dir);
        let task = cmd_add(&engine, add_args("Zinc"), 20, Utc::now(), true).await.unwrap();
        cmd_record(&engine, &task.id, true, Utc::now(), true).await.unwrap();
        assert!(dir.join("task_history.json").exists());

        cmd_reset(&engine, true).await.unwrap();
        assert!(!dir.join("tasks.json").exists());
        assert!(!dir.join("task_history.json").exists());
        assert!(engine.tasks().list().await.is_empty());
    })
    .await;
}

#[test]
fn test_parse_start_accepts_date_or_instant() {
    assert!(parse_start("2025-06-01").is_ok());
    assert_eq!(
        parse_start("2025-06-01T09:00:00+02:00").unwrap(),
        "2025-06-01T07:00:00Z".parse::<chrono::DateTime<Utc>>().unwrap()
    );
    assert!(matches!(parse_start("June 1st"), Err(Error::InvalidTaskState(_))));
}
