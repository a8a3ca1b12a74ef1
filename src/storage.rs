//! Durable key to JSON-document persistence.
//!
//! The engine only ever talks to the [`Store`] trait. [`JsonFileStore`]
//! keeps one pretty-printed JSON file per key in the data directory;
//! [`MemoryStore`] backs tests and can be told to fail reads or writes.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Key of the task collection.
pub const TASKS_KEY: &str = "@tasks";
/// Key of the history collection.
pub const HISTORY_KEY: &str = "@task_history";
/// Key owned by the notification center.
pub const NOTIFICATIONS_KEY: &str = "@notifications";

/// Key to JSON-document store. Each key is replaced atomically.
pub trait Store: Send + Sync {
    /// Reads the document stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Replaces the document stored under `key`.
    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<()>> + Send;

    /// Removes every listed key. Missing keys are ignored.
    fn remove_many(&self, keys: &[&str]) -> impl Future<Output = Result<()>> + Send;
}

/// Loads a JSON array stored under `key`, treating a missing key as empty.
pub async fn load_collection<S, T>(store: &S, key: &str) -> Result<Vec<T>>
where
    S: Store,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| Error::StorageFailure(format!("corrupt collection {key}: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Writes a whole collection under `key`.
pub async fn save_collection<S, T>(store: &S, key: &str, items: &[T]) -> Result<()>
where
    S: Store,
    T: Serialize,
{
    let value = serde_json::to_value(items)
        .map_err(|e| Error::StorageFailure(format!("cannot encode {key}: {e}")))?;
    store.set(key, value).await
}

/// Returns the default data directory (`~/.local/share/regimen` on Linux).
///
/// Falls back to `./regimen` when the platform has no data directory.
pub fn default_data_dir() -> PathBuf {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("regimen");
    p
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `@tasks` lands in `tasks.json`.
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .trim_start_matches('@')
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl Store for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::StorageFailure(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| Error::StorageFailure(format!("corrupt file {}: {e}", path.display())))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key);
        let s = serde_json::to_string_pretty(&value)
            .map_err(|e| Error::StorageFailure(format!("cannot encode {key}: {e}")))?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::StorageFailure(format!("cannot create {}: {e}", self.dir.display()))
        })?;
        // Write aside and rename so readers never see a half-written file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, s.as_bytes())
            .await
            .map_err(|e| Error::StorageFailure(format!("cannot write {}: {e}", tmp.display())))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                tracing::warn!(path = %tmp.display(), error = %cleanup, "leftover temp file");
            }
            return Err(Error::StorageFailure(format!(
                "cannot replace {}: {e}",
                path.display()
            )));
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            let path = self.path_for(key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::StorageFailure(format!(
                        "cannot remove {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    rejected_keys: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `get` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `set`/`remove_many` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes of `key` alone fail.
    pub async fn reject_writes_to(&self, key: &str) {
        self.rejected_keys.lock().await.insert(key.to_string());
    }

    /// Whether a document exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.docs.lock().await.contains_key(key)
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::StorageFailure(format!("read of {key} rejected")));
        }
        Ok(self.docs.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) || self.rejected_keys.lock().await.contains(key) {
            return Err(Error::StorageFailure(format!("write of {key} rejected")));
        }
        self.docs.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StorageFailure("remove rejected".into()));
        }
        let mut docs = self.docs.lock().await;
        for key in keys {
            docs.remove(*key);
        }
        Ok(())
    }
}
