use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::Result;
use crate::models::Task;
use crate::storage::{load_collection, save_collection, Store, TASKS_KEY};

/// CRUD over the task collection.
///
/// Every write is a whole-collection read-modify-write. Writes from this
/// process go through a shared gate, so two overlapping updates cannot
/// overwrite each other. A second process writing the same store still
/// wins or loses as a whole.
pub struct TaskRepository<S> {
    store: Arc<S>,
    gate: Arc<Mutex<()>>,
}

impl<S> Clone for TaskRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<S: Store> TaskRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Holds off every other task write until the guard drops.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Loads all tasks.
    ///
    /// Returns an empty vector if the store cannot be read.
    pub async fn list(&self) -> Vec<Task> {
        match self.try_list().await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load tasks; showing none");
                Vec::new()
            }
        }
    }

    /// Loads all tasks, surfacing read failures.
    pub async fn try_list(&self) -> Result<Vec<Task>> {
        load_collection(&*self.store, TASKS_KEY).await
    }

    /// Loads a single task by its id.
    pub async fn get(&self, id: &str) -> Option<Task> {
        self.list().await.into_iter().find(|t| t.id == id)
    }

    /// Appends a task.
    pub async fn add(&self, task: &Task) -> Result<()> {
        let _guard = self.lock().await;
        let mut tasks = self.try_list().await?;
        let mut task = task.clone();
        task.normalize();
        tracing::debug!(task_id = %task.id, "adding task");
        tasks.push(task);
        save_collection(&*self.store, TASKS_KEY, &tasks).await
    }

    /// Replaces the stored task with the same id.
    ///
    /// Returns `false` and writes nothing when no such task exists.
    pub async fn update(&self, task: &Task) -> Result<bool> {
        let replaced = self
            .modify(&task.id, |stored| *stored = task.clone())
            .await?;
        Ok(replaced.is_some())
    }

    /// Applies `f` to the stored task with the given id and persists it.
    ///
    /// Returns the task as written, or `None` if it does not exist.
    pub async fn modify<F>(&self, id: &str, f: F) -> Result<Option<Task>>
    where
        F: FnOnce(&mut Task),
    {
        let _guard = self.lock().await;
        let mut tasks = self.try_list().await?;
        let Some(stored) = tasks.iter_mut().find(|t| t.id == id) else {
            tracing::debug!(task_id = %id, "update skipped; task not found");
            return Ok(None);
        };
        f(stored);
        stored.normalize();
        let written = stored.clone();
        save_collection(&*self.store, TASKS_KEY, &tasks).await?;
        Ok(Some(written))
    }

    /// Removes a task. Returns whether anything was removed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock().await;
        let mut tasks = self.try_list().await?;
        let len_before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == len_before {
            return Ok(false);
        }
        save_collection(&*self.store, TASKS_KEY, &tasks).await?;
        Ok(true)
    }
}
