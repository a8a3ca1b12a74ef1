//! Turns task state into notification requests.
//!
//! Reminders are best effort. Nothing in here returns an error: permission
//! problems, platform rejections and malformed times are logged and end up
//! as "no reminder".

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone, Timelike, Utc};

use crate::models::{parse_time_of_day, SupplyLevel, Task};
use crate::notify::{
    NotificationData, NotificationId, NotificationKind, NotificationPayload, NotificationService,
    Permission,
};
use crate::supply::classify;

/// Next instant at or after `now` whose wall-clock time in `now`'s zone is `time`.
///
/// A time that has already passed today lands on tomorrow. Returns `None`
/// when the local time does not exist on either day (DST gap).
pub fn next_occurrence<Tz: TimeZone>(time: NaiveTime, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = tz.from_local_datetime(&today.and_time(time)).earliest();
    match candidate {
        Some(at) if at >= *now => Some(at),
        _ => {
            let tomorrow = today.checked_add_days(Days::new(1))?;
            tz.from_local_datetime(&tomorrow.and_time(time)).earliest()
        }
    }
}

pub struct ReminderScheduler<N> {
    service: N,
    permitted: AtomicBool,
}

impl<N: NotificationService> ReminderScheduler<N> {
    pub fn new(service: N) -> Self {
        Self {
            service,
            permitted: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &N {
        &self.service
    }

    /// Configures the service and asks for permission.
    ///
    /// Returns whether reminders can be scheduled.
    pub async fn start(&self) -> bool {
        if let Err(e) = self.service.configure().await {
            tracing::warn!(error = %e, "notification service unavailable");
            self.permitted.store(false, Ordering::SeqCst);
            return false;
        }
        let granted = self.service.request_permission().await == Permission::Granted;
        if !granted {
            tracing::warn!("notification permission denied; reminders disabled");
        }
        self.permitted.store(granted, Ordering::SeqCst);
        granted
    }

    pub async fn shutdown(&self) {
        self.permitted.store(false, Ordering::SeqCst);
        self.service.shutdown().await;
    }

    fn permitted(&self) -> bool {
        let permitted = self.permitted.load(Ordering::SeqCst);
        if !permitted {
            tracing::debug!("reminders not permitted; skipping");
        }
        permitted
    }

    /// Registers a daily trigger for every time of the task.
    ///
    /// Returns the ids of the triggers that were registered.
    pub async fn schedule_task_reminders(
        &self,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Vec<NotificationId> {
        if !task.reminder_enabled || !self.permitted() {
            return Vec::new();
        }
        let mut ids = Vec::with_capacity(task.times.len());
        for raw in &task.times {
            let time = match parse_time_of_day(raw) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "skipping reminder");
                    continue;
                }
            };
            let payload = NotificationPayload {
                title: "Task Reminder".into(),
                body: format!("Time to do {} ({})", task.name, task.description),
                data: NotificationData {
                    task_id: task.id.clone(),
                    kind: NotificationKind::Reminder,
                },
            };
            // The trigger repeats at the wall-clock time of the first firing.
            let first = next_occurrence(time, &now.with_timezone(&Local));
            let (hour, minute) = first
                .as_ref()
                .map_or((time.hour(), time.minute()), |at| (at.hour(), at.minute()));
            match self
                .service
                .schedule_repeating_daily(hour, minute, payload)
                .await
            {
                Ok(id) => {
                    tracing::debug!(task_id = %task.id, %id, time = %raw, first = ?first, "reminder scheduled");
                    ids.push(id);
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, time = %raw, error = %e, "failed to schedule reminder");
                }
            }
        }
        ids
    }

    /// Shows a low-supply notification if the task asks for one and is low.
    pub async fn schedule_refill_reminder(&self, task: &Task) -> Option<NotificationId> {
        if !task.refill_reminder || classify(task) != SupplyLevel::Low || !self.permitted() {
            return None;
        }
        let payload = NotificationPayload {
            title: "Refill Reminder".into(),
            body: format!(
                "Your {} supply is running low. Current supply: {}",
                task.name, task.current_supply
            ),
            data: NotificationData {
                task_id: task.id.clone(),
                kind: NotificationKind::Refill,
            },
        };
        match self.service.schedule_immediate(payload).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "failed to send refill reminder");
                None
            }
        }
    }

    /// Cancels every scheduled notification tagged with `task_id`.
    ///
    /// Scans all outstanding notifications; returns how many were cancelled.
    pub async fn cancel_all_for_task(&self, task_id: &str) -> usize {
        let scheduled = match self.service.list_scheduled().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(task_id, error = %e, "cannot list scheduled notifications");
                return 0;
            }
        };
        let mut cancelled = 0;
        for n in scheduled.iter().filter(|n| n.payload.data.task_id == task_id) {
            match self.service.cancel(&n.id).await {
                Ok(()) => cancelled += 1,
                Err(e) => tracing::warn!(task_id, id = %n.id, error = %e, "failed to cancel"),
            }
        }
        cancelled
    }

    /// Drops the task's reminders and schedules them again from its current state.
    pub async fn reschedule(&self, task: &Task, now: DateTime<Utc>) -> Vec<NotificationId> {
        self.cancel_all_for_task(&task.id).await;
        let ids = self.schedule_task_reminders(task, now).await;
        self.schedule_refill_reminder(task).await;
        ids
    }

    /// Reschedules the daily reminders of every task.
    pub async fn sync_all(&self, tasks: &[Task], now: DateTime<Utc>) {
        if !self.permitted() {
            return;
        }
        for task in tasks {
            self.cancel_all_for_task(&task.id).await;
            self.schedule_task_reminders(task, now).await;
        }
    }
}
