use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::error::{Error, Result};
use crate::history::{self, DayGroup, HistoryLedger};
use crate::models::{HistoryEntry, HistoryFilter, SupplyLevel, Task, TaskDraft, TaskHistory};
use crate::notify::NotificationService;
use crate::reminders::ReminderScheduler;
use crate::repository::TaskRepository;
use crate::schedule::Agenda;
use crate::storage::Store;
use crate::supply::{classify, SupplyTracker};

/// Runs user commands against the repository, ledger, supply tracker and
/// reminder scheduler, keeping reminders in step with task edits.
pub struct Regimen<S, N> {
    tasks: TaskRepository<S>,
    supply: SupplyTracker<S>,
    history: HistoryLedger<S>,
    reminders: ReminderScheduler<N>,
}

impl<S: Store, N: NotificationService> Regimen<S, N> {
    pub fn new(store: Arc<S>, notifications: N) -> Self {
        let tasks = TaskRepository::new(Arc::clone(&store));
        let supply = SupplyTracker::new(tasks.clone());
        let history = HistoryLedger::new(store, supply.clone());
        Self {
            tasks,
            supply,
            history,
            reminders: ReminderScheduler::new(notifications),
        }
    }

    pub fn tasks(&self) -> &TaskRepository<S> {
        &self.tasks
    }

    pub fn supply(&self) -> &SupplyTracker<S> {
        &self.supply
    }

    pub fn history(&self) -> &HistoryLedger<S> {
        &self.history
    }

    pub fn reminders(&self) -> &ReminderScheduler<N> {
        &self.reminders
    }

    /// Brings up notifications and re-registers every task's daily reminders.
    pub async fn start(&self, now: DateTime<Utc>) {
        if self.reminders.start().await {
            let tasks = self.tasks.list().await;
            self.reminders.sync_all(&tasks, now).await;
        }
    }

    pub async fn shutdown(&self) {
        self.reminders.shutdown().await;
    }

    /// Creates a task with a fresh id and schedules its reminders.
    pub async fn add_task(&self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task> {
        let mut task = draft.into_task(uuid::Uuid::new_v4().to_string());
        task.validate()?;
        task.normalize();
        self.tasks.add(&task).await?;
        tracing::info!(task_id = %task.id, name = %task.name, "task added");
        self.reminders.reschedule(&task, now).await;
        Ok(task)
    }

    /// Replaces a task and reschedules its reminders.
    pub async fn update_task(&self, task: &Task, now: DateTime<Utc>) -> Result<Task> {
        task.validate()?;
        let updated = self
            .tasks
            .modify(&task.id, |stored| *stored = task.clone())
            .await?
            .ok_or_else(|| Error::TaskNotFound(task.id.clone()))?;
        tracing::info!(task_id = %updated.id, "task updated");
        self.reminders.reschedule(&updated, now).await;
        Ok(updated)
    }

    /// Deletes a task and cancels its reminders. History records stay.
    pub async fn remove_task(&self, id: &str) -> Result<()> {
        if !self.tasks.remove(id).await? {
            return Err(Error::TaskNotFound(id.to_string()));
        }
        tracing::info!(task_id = id, "task removed");
        self.reminders.cancel_all_for_task(id).await;
        Ok(())
    }

    /// Records a taken (`done`) or missed dose.
    ///
    /// A dose that drops the task into low supply triggers its refill reminder.
    pub async fn record_dose(&self, task_id: &str, done: bool, at: DateTime<Utc>) -> Result<TaskHistory> {
        let before = if done { self.tasks.get(task_id).await } else { None };
        let record = self.history.append(task_id, done, at).await?;
        if let Some(before) = before {
            if let Some(after) = self.tasks.get(task_id).await {
                if classify(&before) != SupplyLevel::Low && classify(&after) == SupplyLevel::Low {
                    self.reminders.schedule_refill_reminder(&after).await;
                }
            }
        }
        Ok(record)
    }

    /// Refills a task to its full supply.
    pub async fn refill(&self, task_id: &str, now: DateTime<Utc>) -> Result<Task> {
        self.supply.record_refill(task_id, now).await
    }

    /// Today's due tasks, their done flags and progress.
    ///
    /// Reads only; calling it again after resume just rebuilds the projection.
    pub async fn agenda(&self, now: DateTime<Utc>) -> Agenda {
        let tasks = self.tasks.list().await;
        let today = now.with_timezone(&Local).date_naive();
        let todays_history = self.history.list_for_day(today).await;
        Agenda::build(&tasks, &todays_history, now)
    }

    /// History records joined with their tasks, in log order.
    pub async fn history_entries(&self, filter: HistoryFilter) -> Vec<HistoryEntry> {
        let records = history::filter(self.history.list_all().await, filter);
        history::enrich(records, &self.tasks.list().await)
    }

    /// History grouped by local calendar day, newest first.
    pub async fn history_by_day(&self, filter: HistoryFilter) -> Vec<DayGroup> {
        history::group_by_day(self.history_entries(filter).await, &Local)
    }

    /// Every task with its supply level.
    pub async fn supply_overview(&self) -> Vec<(Task, SupplyLevel)> {
        self.tasks
            .list()
            .await
            .into_iter()
            .map(|t| {
                let level = classify(&t);
                (t, level)
            })
            .collect()
    }

    /// Wipes all tasks and history and cancels their reminders.
    pub async fn reset(&self) -> Result<()> {
        let existing = self.tasks.list().await;
        self.history.clear().await?;
        for task in &existing {
            self.reminders.cancel_all_for_task(&task.id).await;
        }
        Ok(())
    }
}
