//! # regimen
//!
//! Scheduling and supply-tracking engine for recurring medication-style tasks.
//!
//! *   **Tasks** carry daily times, a start instant and a duration window
//!     (a number of days or `Ongoing`), plus a dose supply.
//! *   **History** is an append-only log of taken/missed events. A task is
//!     done for the day once any `done` record exists for it.
//! *   **Supply** drops by one per taken dose, never below zero, and is
//!     classified as Low / Medium / Good against the task's refill threshold.
//! *   **Reminders** are daily wall-clock notifications per task time, plus a
//!     one-shot alert when supply is low.
//!
//! [`engine::Regimen`] ties the pieces together over any [`storage::Store`]
//! and [`notify::NotificationService`].

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod models;
pub mod notify;
pub mod reminders;
pub mod repository;
pub mod schedule;
pub mod storage;
pub mod supply;

pub use engine::Regimen;
pub use error::{Error, Result};
