use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{SupplyLevel, Task};
use crate::repository::TaskRepository;
use crate::storage::Store;

/// Percentage at or below which a task that is not yet low counts as medium.
pub const MEDIUM_THRESHOLD: f64 = 50.0;

/// Classifies the remaining supply of a task.
///
/// The task's own `refill_at` threshold is checked before the fixed medium
/// line, so a threshold above 50 turns medium supply into low supply.
/// A task with zero total supply classifies as low.
pub fn classify(task: &Task) -> SupplyLevel {
    let percentage = match task.supply_percentage() {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "treating unmeasurable supply as low");
            return SupplyLevel::Low;
        }
    };
    if percentage <= f64::from(task.refill_at) {
        SupplyLevel::Low
    } else if percentage <= MEDIUM_THRESHOLD {
        SupplyLevel::Medium
    } else {
        SupplyLevel::Good
    }
}

/// Keeps per-task dose counters in step with the history ledger.
///
/// All writes go through [`TaskRepository::modify`].
pub struct SupplyTracker<S> {
    tasks: TaskRepository<S>,
}

impl<S> Clone for SupplyTracker<S> {
    fn clone(&self) -> Self {
        Self {
            tasks: self.tasks.clone(),
        }
    }
}

impl<S: Store> SupplyTracker<S> {
    pub fn new(tasks: TaskRepository<S>) -> Self {
        Self { tasks }
    }

    pub(crate) fn repository(&self) -> &TaskRepository<S> {
        &self.tasks
    }

    /// Takes one dose off the task's supply.
    ///
    /// Supply never drops below zero; at zero this writes nothing. Returns
    /// the task after the call, or `None` if it does not exist. A store that
    /// cannot be read is an error, not an unknown task.
    pub async fn record_completion(&self, task_id: &str) -> Result<Option<Task>> {
        let tasks = self.tasks.try_list().await?;
        let Some(task) = tasks.into_iter().find(|t| t.id == task_id) else {
            tracing::debug!(task_id, "completion for unknown task; supply untouched");
            return Ok(None);
        };
        if task.current_supply == 0 {
            tracing::debug!(task_id, "supply already empty");
            return Ok(Some(task));
        }
        let updated = self
            .tasks
            .modify(task_id, |t| t.current_supply = t.current_supply.saturating_sub(1))
            .await?;
        if let Some(t) = &updated {
            tracing::debug!(task_id, remaining = t.current_supply, "supply decremented");
        }
        Ok(updated)
    }

    /// Resets supply to full and stamps the refill instant.
    pub async fn record_refill(&self, task_id: &str, now: DateTime<Utc>) -> Result<Task> {
        let refilled = self
            .tasks
            .modify(task_id, |t| {
                t.current_supply = t.total_supply;
                t.last_refill_date = Some(now);
            })
            .await?
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        tracing::info!(task_id, supply = refilled.current_supply, "refill recorded");
        Ok(refilled)
    }
}
