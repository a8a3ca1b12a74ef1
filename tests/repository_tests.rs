use std::sync::Arc;

use futures_util::future::join_all;
use regimen::models::{Task, TaskDraft};
use regimen::repository::TaskRepository;
use regimen::storage::MemoryStore;
use regimen::Error;

fn task(id: &str) -> Task {
    TaskDraft {
        name: format!("Task {id}"),
        description: "with food".into(),
        times: vec!["08:00".into(), "20:00".into(), "20:00".into()],
        start_date: "2025-03-01T07:30:00Z".parse().unwrap(),
        duration: "14 days".into(),
        color: "#2196F3".into(),
        reminder_enabled: true,
        current_supply: 12,
        total_supply: 28,
        refill_at: 25,
        refill_reminder: true,
    }
    .into_task(id.into())
}

fn repo() -> (Arc<MemoryStore>, TaskRepository<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Arc::clone(&store), TaskRepository::new(store))
}

#[tokio::test]
async fn test_add_and_list_round_trip() {
    let (_store, repo) = repo();
    let mut t = task("a");
    t.last_refill_date = Some("2025-02-20T12:00:00Z".parse().unwrap());
    repo.add(&t).await.unwrap();

    let tasks = repo.list().await;
    assert_eq!(tasks, vec![t]);
}

#[tokio::test]
async fn test_update_replaces_by_id() {
    let (_store, repo) = repo();
    repo.add(&task("a")).await.unwrap();
    repo.add(&task("b")).await.unwrap();

    let mut changed = task("b");
    changed.name = "Renamed".into();
    changed.times = vec!["12:00".into()];
    assert!(repo.update(&changed).await.unwrap());

    let tasks = repo.list().await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0], task("a"));
    assert_eq!(tasks[1], changed);
}

#[tokio::test]
async fn test_update_of_missing_task_is_a_no_op() {
    let (_store, repo) = repo();
    repo.add(&task("a")).await.unwrap();
    assert!(!repo.update(&task("zzz")).await.unwrap());
    assert_eq!(repo.list().await, vec![task("a")]);
}

#[tokio::test]
async fn test_writes_clamp_supply() {
    let (_store, repo) = repo();
    let mut t = task("a");
    t.current_supply = 99;
    t.refill_at = 400;
    repo.add(&t).await.unwrap();

    let stored = repo.get("a").await.unwrap();
    assert_eq!(stored.current_supply, stored.total_supply);
    assert_eq!(stored.refill_at, 100);
}

#[tokio::test]
async fn test_remove() {
    let (_store, repo) = repo();
    repo.add(&task("a")).await.unwrap();
    repo.add(&task("b")).await.unwrap();

    assert!(repo.remove("a").await.unwrap());
    assert!(!repo.remove("a").await.unwrap());
    assert_eq!(repo.list().await, vec![task("b")]);
}

#[tokio::test]
async fn test_list_soft_fails_but_writes_hard_fail() {
    let (store, repo) = repo();
    repo.add(&task("a")).await.unwrap();

    store.set_fail_reads(true);
    assert!(repo.list().await.is_empty());
    assert!(repo.get("a").await.is_none());
    assert!(matches!(repo.try_list().await, Err(Error::StorageFailure(_))));
    // A failed read must not turn into an overwrite with an empty collection.
    assert!(matches!(repo.add(&task("b")).await, Err(Error::StorageFailure(_))));
    store.set_fail_reads(false);

    store.set_fail_writes(true);
    assert!(repo.add(&task("b")).await.is_err());
    assert!(repo.update(&task("a")).await.is_err());
    assert!(repo.remove("a").await.is_err());
    store.set_fail_writes(false);

    assert_eq!(repo.list().await, vec![task("a")]);
}

#[tokio::test]
async fn test_concurrent_adds_keep_every_task() {
    let (_store, repo) = repo();
    let tasks: Vec<Task> = (0..8).map(|i| task(&i.to_string())).collect();
    for res in join_all(tasks.iter().map(|t| repo.add(t))).await {
        res.unwrap();
    }
    assert_eq!(repo.list().await.len(), 8);
}

#[tokio::test]
async fn test_stored_json_uses_wire_field_names() {
    use regimen::storage::{Store, TASKS_KEY};

    let (store, repo) = repo();
    repo.add(&task("a")).await.unwrap();
    let doc = store.get(TASKS_KEY).await.unwrap().unwrap();
    let first = &doc[0];
    for field in [
        "id",
        "name",
        "description",
        "times",
        "startDate",
        "duration",
        "color",
        "reminderEnabled",
        "currentSupply",
        "totalSupply",
        "refillAt",
        "refillReminder",
    ] {
        assert!(first.get(field).is_some(), "missing {field}");
    }
}
