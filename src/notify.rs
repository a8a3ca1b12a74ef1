//! Local notification platform.
//!
//! [`NotificationService`] is the boundary the reminder scheduler talks to.
//! It has an explicit lifecycle: `configure` before use, `shutdown` after.
//! [`NotificationCenter`] is the bundled implementation. It persists
//! scheduled triggers in the store under its own key and keeps immediate
//! notifications in a bounded inbox.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::storage::{Store, NOTIFICATIONS_KEY};

/// Default maximum number of delivered notifications kept in the inbox.
const DEFAULT_INBOX_SIZE: usize = 100;

/// Identifier handed out by the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Time to take a dose.
    Reminder,
    /// Supply is running low.
    Refill,
}

/// Metadata attached to a notification; `task_id` is what cancellation scans for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub task_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub data: NotificationData,
}

/// When a scheduled notification fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Every day at this wall-clock time.
    Daily { hour: u32, minute: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: NotificationId,
    pub trigger: Trigger,
    pub payload: NotificationPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredNotification {
    pub id: NotificationId,
    pub delivered_at: DateTime<Utc>,
    pub payload: NotificationPayload,
}

pub trait NotificationService: Send + Sync {
    /// Prepares the service for use.
    fn configure(&self) -> impl Future<Output = Result<()>> + Send;

    /// Releases the service. Scheduling afterwards fails until reconfigured.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;

    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    /// Registers a calendar trigger repeating daily at `hour:minute`.
    fn schedule_repeating_daily(
        &self,
        hour: u32,
        minute: u32,
        payload: NotificationPayload,
    ) -> impl Future<Output = Result<NotificationId>> + Send;

    /// Shows a notification right away.
    fn schedule_immediate(
        &self,
        payload: NotificationPayload,
    ) -> impl Future<Output = Result<NotificationId>> + Send;

    fn list_scheduled(&self) -> impl Future<Output = Result<Vec<ScheduledNotification>>> + Send;

    fn cancel(&self, id: &NotificationId) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CenterState {
    scheduled: Vec<ScheduledNotification>,
    delivered: VecDeque<DeliveredNotification>,
}

/// Store-backed notification center.
pub struct NotificationCenter<S> {
    store: Arc<S>,
    allow: bool,
    configured: AtomicBool,
    inbox_size: usize,
    gate: Mutex<()>,
}

impl<S: Store> NotificationCenter<S> {
    /// Creates a center. `allow` is the answer to permission requests.
    pub fn new(store: Arc<S>, allow: bool) -> Self {
        Self {
            store,
            allow,
            configured: AtomicBool::new(false),
            inbox_size: DEFAULT_INBOX_SIZE,
            gate: Mutex::new(()),
        }
    }

    /// Creates a center keeping at most `inbox_size` delivered notifications.
    pub fn with_inbox_size(store: Arc<S>, allow: bool, inbox_size: usize) -> Self {
        Self {
            inbox_size,
            ..Self::new(store, allow)
        }
    }

    /// Notifications shown so far, oldest first.
    pub async fn delivered(&self) -> Result<Vec<DeliveredNotification>> {
        Ok(self.load().await?.delivered.into_iter().collect())
    }

    fn ensure_usable(&self) -> Result<()> {
        if !self.configured.load(Ordering::SeqCst) {
            return Err(Error::NotSupportedPermission(
                "notification center is not configured".into(),
            ));
        }
        if !self.allow {
            return Err(Error::NotSupportedPermission("permission denied".into()));
        }
        Ok(())
    }

    async fn load(&self) -> Result<CenterState> {
        match self.store.get(NOTIFICATIONS_KEY).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::StorageFailure(format!("corrupt notification state: {e}"))),
            None => Ok(CenterState::default()),
        }
    }

    async fn save(&self, state: &CenterState) -> Result<()> {
        let value = serde_json::to_value(state)
            .map_err(|e| Error::StorageFailure(format!("cannot encode notification state: {e}")))?;
        self.store.set(NOTIFICATIONS_KEY, value).await
    }

    fn next_id() -> NotificationId {
        NotificationId(uuid::Uuid::new_v4().to_string())
    }
}

impl<S: Store> NotificationService for NotificationCenter<S> {
    async fn configure(&self) -> Result<()> {
        self.configured.store(true, Ordering::SeqCst);
        tracing::debug!("notification center configured");
        Ok(())
    }

    async fn shutdown(&self) {
        self.configured.store(false, Ordering::SeqCst);
        tracing::debug!("notification center shut down");
    }

    async fn request_permission(&self) -> Permission {
        if self.allow {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn schedule_repeating_daily(
        &self,
        hour: u32,
        minute: u32,
        payload: NotificationPayload,
    ) -> Result<NotificationId> {
        self.ensure_usable()?;
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidTaskState(format!(
                "no such time of day {hour:02}:{minute:02}"
            )));
        }
        let _guard = self.gate.lock().await;
        let mut state = self.load().await?;
        let id = Self::next_id();
        state.scheduled.push(ScheduledNotification {
            id: id.clone(),
            trigger: Trigger::Daily { hour, minute },
            payload,
        });
        self.save(&state).await?;
        Ok(id)
    }

    async fn schedule_immediate(&self, payload: NotificationPayload) -> Result<NotificationId> {
        self.ensure_usable()?;
        let _guard = self.gate.lock().await;
        let mut state = self.load().await?;
        let id = Self::next_id();
        tracing::info!(title = %payload.title, body = %payload.body, "notification");
        state.delivered.push_back(DeliveredNotification {
            id: id.clone(),
            delivered_at: Utc::now(),
            payload,
        });
        while state.delivered.len() > self.inbox_size {
            state.delivered.pop_front();
        }
        self.save(&state).await?;
        Ok(id)
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        Ok(self.load().await?.scheduled)
    }

    async fn cancel(&self, id: &NotificationId) -> Result<()> {
        let _guard = self.gate.lock().await;
        let mut state = self.load().await?;
        let before = state.scheduled.len();
        state.scheduled.retain(|n| &n.id != id);
        if state.scheduled.len() != before {
            self.save(&state).await?;
        }
        Ok(())
    }
}
