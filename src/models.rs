use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Duration string stored for tasks with no end date.
pub const ONGOING: &str = "Ongoing";

/// Represents a single recurring regimen item.
///
/// Field names serialize in camelCase; other collaborators read this shape
/// straight out of the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, assigned at creation.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description (dosage, instructions).
    #[serde(default)]
    pub description: String,
    /// Daily occurrence times as `HH:MM`, in order.
    #[serde(default)]
    pub times: Vec<String>,
    /// The task has no effect before this instant.
    pub start_date: DateTime<Utc>,
    /// Number of days (`"7"`, `"7 days"`) or the ongoing sentinel.
    pub duration: String,
    /// Display tag.
    #[serde(default)]
    pub color: String,
    /// Whether daily reminders are scheduled.
    #[serde(default)]
    pub reminder_enabled: bool,
    /// Doses remaining.
    #[serde(default)]
    pub current_supply: u32,
    /// Doses in a full supply.
    #[serde(default)]
    pub total_supply: u32,
    /// Percentage at or below which supply counts as low.
    #[serde(default)]
    pub refill_at: u32,
    /// Whether a low-supply notification fires.
    #[serde(default)]
    pub refill_reminder: bool,
    /// Instant of the last refill, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refill_date: Option<DateTime<Utc>>,
}

/// Everything needed to create a task except its id.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    pub times: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub duration: String,
    pub color: String,
    pub reminder_enabled: bool,
    pub current_supply: u32,
    pub total_supply: u32,
    pub refill_at: u32,
    pub refill_reminder: bool,
}

impl TaskDraft {
    /// Turns the draft into a task carrying the given id.
    pub fn into_task(self, id: String) -> Task {
        Task {
            id,
            name: self.name,
            description: self.description,
            times: self.times,
            start_date: self.start_date,
            duration: self.duration,
            color: self.color,
            reminder_enabled: self.reminder_enabled,
            current_supply: self.current_supply,
            total_supply: self.total_supply,
            refill_at: self.refill_at,
            refill_reminder: self.refill_reminder,
            last_refill_date: None,
        }
    }
}

/// Parsed form of [`Task::duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDuration {
    /// Active for this many days after the start instant.
    Days(u32),
    /// No end date.
    Ongoing,
}

impl TaskDuration {
    /// Parses `"N"`, `"N day"`, `"N days"`, `"-1"` or `"Ongoing"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(ONGOING) {
            return Ok(Self::Ongoing);
        }
        let mut parts = trimmed.split_whitespace();
        let count = parts.next().unwrap_or_default();
        let unit = parts.next();
        if parts.next().is_some() || !matches!(unit, None | Some("day" | "days")) {
            return Err(Error::InvalidTaskState(format!("malformed duration '{raw}'")));
        }
        match count.parse::<i64>() {
            Ok(-1) => Ok(Self::Ongoing),
            Ok(n) => u32::try_from(n)
                .map(Self::Days)
                .map_err(|_| Error::InvalidTaskState(format!("duration out of range '{raw}'"))),
            Err(_) => Err(Error::InvalidTaskState(format!("malformed duration '{raw}'"))),
        }
    }
}

impl fmt::Display for TaskDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(1) => write!(f, "1 day"),
            Self::Days(n) => write!(f, "{n} days"),
            Self::Ongoing => write!(f, "{ONGOING}"),
        }
    }
}

/// Parses a `HH:MM` (24h) time of day.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| Error::InvalidTaskState(format!("invalid time '{raw}': {e}")))
}

impl Task {
    /// Parsed duration of the task.
    pub fn parsed_duration(&self) -> Result<TaskDuration> {
        TaskDuration::parse(&self.duration)
    }

    /// Remaining supply as a percentage of the full supply.
    ///
    /// A zero `total_supply` has no meaningful percentage.
    pub fn supply_percentage(&self) -> Result<f64> {
        if self.total_supply == 0 {
            return Err(Error::InvalidTaskState(format!(
                "task {} has zero total supply",
                self.id
            )));
        }
        Ok(f64::from(self.current_supply) / f64::from(self.total_supply) * 100.0)
    }

    /// Checks the fields a task must get right before it is persisted.
    pub fn validate(&self) -> Result<()> {
        self.parsed_duration()?;
        for time in &self.times {
            parse_time_of_day(time)?;
        }
        Ok(())
    }

    /// Clamps supply fields back into their allowed ranges.
    pub fn normalize(&mut self) {
        self.current_supply = self.current_supply.min(self.total_supply);
        self.refill_at = self.refill_at.min(100);
    }
}

/// An immutable fact: at `timestamp`, the task was taken (`done`) or missed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistory {
    /// Unique identifier, generated at insertion.
    pub id: String,
    /// The task this record refers to.
    pub task_id: String,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// `true` for taken, `false` for missed.
    pub done: bool,
}

/// Supply classification of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyLevel {
    Low,
    Medium,
    Good,
}

impl fmt::Display for SupplyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::Good => "Good",
        };
        f.write_str(label)
    }
}

/// Which history records a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HistoryFilter {
    #[default]
    All,
    Done,
    Missed,
}

impl HistoryFilter {
    pub fn matches(self, record: &TaskHistory) -> bool {
        match self {
            Self::All => true,
            Self::Done => record.done,
            Self::Missed => !record.done,
        }
    }
}

/// A history record joined with the task it refers to.
///
/// The task is `None` once it has been removed.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub record: TaskHistory,
    pub task: Option<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_counts() {
        assert_eq!(TaskDuration::parse("3").unwrap(), TaskDuration::Days(3));
        assert_eq!(TaskDuration::parse("1 day").unwrap(), TaskDuration::Days(1));
        assert_eq!(TaskDuration::parse(" 30 days ").unwrap(), TaskDuration::Days(30));
        assert_eq!(TaskDuration::parse("0").unwrap(), TaskDuration::Days(0));
    }

    #[test]
    fn parses_ongoing_sentinels() {
        assert_eq!(TaskDuration::parse("Ongoing").unwrap(), TaskDuration::Ongoing);
        assert_eq!(TaskDuration::parse("ongoing").unwrap(), TaskDuration::Ongoing);
        assert_eq!(TaskDuration::parse("-1").unwrap(), TaskDuration::Ongoing);
        assert_eq!(TaskDuration::parse("-1 days").unwrap(), TaskDuration::Ongoing);
    }

    #[test]
    fn rejects_malformed_durations() {
        for raw in ["", "abc", "-2", "3 weeks", "3 days extra", "1.5"] {
            assert!(
                matches!(TaskDuration::parse(raw), Err(Error::InvalidTaskState(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        for d in [TaskDuration::Days(1), TaskDuration::Days(14), TaskDuration::Ongoing] {
            assert_eq!(TaskDuration::parse(&d.to_string()).unwrap(), d);
        }
    }

    #[test]
    fn time_of_day_requires_hours_and_minutes() {
        assert_eq!(
            parse_time_of_day("08:30").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("8").is_err());
    }

    #[test]
    fn task_serializes_with_camel_case_fields() {
        let task = TaskDraft {
            name: "Vitamin D".into(),
            description: "1 tablet".into(),
            times: vec!["08:00".into()],
            start_date: "2025-01-01T00:00:00Z".parse().unwrap(),
            duration: "30 days".into(),
            color: "#4CAF50".into(),
            reminder_enabled: true,
            current_supply: 10,
            total_supply: 30,
            refill_at: 20,
            refill_reminder: true,
        }
        .into_task("t1".into());

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["startDate"], "2025-01-01T00:00:00Z");
        assert_eq!(json["reminderEnabled"], true);
        assert_eq!(json["currentSupply"], 10);
        assert_eq!(json["refillAt"], 20);
        assert!(json.get("lastRefillDate").is_none());
    }

    #[test]
    fn normalize_clamps_supply() {
        let mut task = TaskDraft {
            name: "x".into(),
            description: String::new(),
            times: Vec::new(),
            start_date: Utc::now(),
            duration: ONGOING.into(),
            color: String::new(),
            reminder_enabled: false,
            current_supply: 50,
            total_supply: 30,
            refill_at: 150,
            refill_reminder: false,
        }
        .into_task("t".into());
        task.normalize();
        assert_eq!(task.current_supply, 30);
        assert_eq!(task.refill_at, 100);
    }
}
