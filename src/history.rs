//! Append-only completion log.
//!
//! Records are never edited. The only way to drop them is [`HistoryLedger::clear`],
//! which wipes tasks as well.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{HistoryEntry, HistoryFilter, Task, TaskHistory};
use crate::storage::{load_collection, save_collection, Store, HISTORY_KEY, TASKS_KEY};
use crate::supply::SupplyTracker;

/// History records of one calendar day, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub entries: Vec<HistoryEntry>,
}

pub struct HistoryLedger<S> {
    store: Arc<S>,
    supply: SupplyTracker<S>,
    gate: Mutex<()>,
}

impl<S: Store> HistoryLedger<S> {
    pub fn new(store: Arc<S>, supply: SupplyTracker<S>) -> Self {
        Self {
            store,
            supply,
            gate: Mutex::new(()),
        }
    }

    /// Loads every record. Returns an empty vector if the store cannot be read.
    pub async fn list_all(&self) -> Vec<TaskHistory> {
        match load_collection(&*self.store, HISTORY_KEY).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load history; showing none");
                Vec::new()
            }
        }
    }

    /// Records whose timestamp falls on `day` in local time.
    pub async fn list_for_day(&self, day: NaiveDate) -> Vec<TaskHistory> {
        records_on_day(self.list_all().await, day, &Local)
    }

    /// Appends a record, then takes a dose off the supply when `done`.
    ///
    /// The record stays in the log even if the supply update fails; that
    /// failure is still returned.
    pub async fn append(
        &self,
        task_id: &str,
        done: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<TaskHistory> {
        let record = TaskHistory {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            timestamp,
            done,
        };
        {
            let _guard = self.gate.lock().await;
            let mut history: Vec<TaskHistory> = load_collection(&*self.store, HISTORY_KEY).await?;
            history.push(record.clone());
            save_collection(&*self.store, HISTORY_KEY, &history).await?;
        }
        tracing::info!(task_id, done, record_id = %record.id, "history recorded");

        if done {
            if let Err(e) = self.supply.record_completion(task_id).await {
                tracing::warn!(task_id, error = %e, "history kept but supply not decremented");
                return Err(e);
            }
        }
        Ok(record)
    }

    /// Deletes the task and history collections. This is a full reset.
    pub async fn clear(&self) -> Result<()> {
        let _tasks = self.supply.repository().lock().await;
        let _history = self.gate.lock().await;
        self.store.remove_many(&[TASKS_KEY, HISTORY_KEY]).await?;
        tracing::info!("all tasks and history cleared");
        Ok(())
    }
}

/// Keeps the records whose timestamp, seen in `tz`, falls on `day`.
pub fn records_on_day<Tz: TimeZone>(
    records: Vec<TaskHistory>,
    day: NaiveDate,
    tz: &Tz,
) -> Vec<TaskHistory> {
    records
        .into_iter()
        .filter(|r| r.timestamp.with_timezone(tz).date_naive() == day)
        .collect()
}

/// Keeps the records a history view shows.
pub fn filter(records: Vec<TaskHistory>, filter: HistoryFilter) -> Vec<TaskHistory> {
    records.into_iter().filter(|r| filter.matches(r)).collect()
}

/// Joins each record with its task.
pub fn enrich(records: Vec<TaskHistory>, tasks: &[Task]) -> Vec<HistoryEntry> {
    records
        .into_iter()
        .map(|record| {
            let task = tasks.iter().find(|t| t.id == record.task_id).cloned();
            HistoryEntry { record, task }
        })
        .collect()
}

/// Groups entries by calendar day in `tz`, newest day first.
pub fn group_by_day<Tz: TimeZone>(entries: Vec<HistoryEntry>, tz: &Tz) -> Vec<DayGroup> {
    let mut days: BTreeMap<NaiveDate, Vec<HistoryEntry>> = BTreeMap::new();
    for entry in entries {
        let day = entry.record.timestamp.with_timezone(tz).date_naive();
        days.entry(day).or_default().push(entry);
    }
    days.into_iter()
        .rev()
        .map(|(day, mut entries)| {
            entries.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));
            DayGroup { day, entries }
        })
        .collect()
}
