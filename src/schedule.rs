use chrono::{DateTime, TimeDelta, Utc};

use crate::models::{Task, TaskDuration, TaskHistory};

const SECONDS_PER_DAY: i64 = 86_400;

/// Expected confirmations per due task per day, used by [`progress`].
pub const CONFIRMATIONS_PER_TASK: usize = 2;

/// Whether `task` is active at `now`.
///
/// Both window ends are inclusive and compared as full instants: a task
/// lasting `n` days runs from its start to exactly `n * 86400` seconds later.
pub fn is_due(task: &Task, now: DateTime<Utc>) -> bool {
    if now < task.start_date {
        return false;
    }
    match task.parsed_duration() {
        Ok(TaskDuration::Ongoing) => true,
        Ok(TaskDuration::Days(days)) => {
            let end = TimeDelta::try_seconds(i64::from(days) * SECONDS_PER_DAY)
                .and_then(|span| task.start_date.checked_add_signed(span));
            // Past the representable range the window never closes.
            end.map_or(true, |end| now <= end)
        }
        Err(e) => {
            tracing::warn!(task_id = %task.id, error = %e, "skipping task with bad duration");
            false
        }
    }
}

/// The tasks due at `now`, in collection order.
pub fn resolve_today(tasks: &[Task], now: DateTime<Utc>) -> Vec<Task> {
    tasks.iter().filter(|t| is_due(t, now)).cloned().collect()
}

/// Whether any record marks the task as taken.
///
/// One `done` record is enough no matter how many times the task has or how
/// many missed records sit beside it.
pub fn is_done_today(task_id: &str, todays_history: &[TaskHistory]) -> bool {
    todays_history
        .iter()
        .any(|r| r.task_id == task_id && r.done)
}

/// Fraction of the day's expected confirmations that happened.
///
/// Not clamped: more completions than expected yield a value above one.
#[allow(clippy::cast_precision_loss)]
pub fn progress(completed: usize, due: usize) -> f64 {
    if due == 0 {
        return 0.0;
    }
    completed as f64 / (due * CONFIRMATIONS_PER_TASK) as f64
}

/// A due task and whether it has been taken today.
#[derive(Debug, Clone, PartialEq)]
pub struct AgendaItem {
    pub task: Task,
    pub done: bool,
}

/// Today's view of the regimen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Agenda {
    pub items: Vec<AgendaItem>,
    /// Number of `done` records today, across all tasks.
    pub completed: usize,
    pub progress: f64,
}

impl Agenda {
    /// Builds the agenda from all tasks and the records of the current day.
    pub fn build(tasks: &[Task], todays_history: &[TaskHistory], now: DateTime<Utc>) -> Self {
        let items: Vec<AgendaItem> = resolve_today(tasks, now)
            .into_iter()
            .map(|task| {
                let done = is_done_today(&task.id, todays_history);
                AgendaItem { task, done }
            })
            .collect();
        let completed = todays_history.iter().filter(|r| r.done).count();
        let progress = progress(completed, items.len());
        Self {
            items,
            completed,
            progress,
        }
    }

    /// Confirmations the progress fraction is measured against.
    pub fn expected(&self) -> usize {
        self.items.len() * CONFIRMATIONS_PER_TASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_zero_without_due_tasks() {
        assert_eq!(progress(3, 0), 0.0);
    }

    #[test]
    fn progress_counts_two_confirmations_per_task() {
        assert!((progress(1, 2) - 0.25).abs() < f64::EPSILON);
        assert!((progress(4, 2) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_is_not_clamped() {
        assert!(progress(5, 1) > 1.0);
    }
}
