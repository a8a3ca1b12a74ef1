use std::io::{self, Write};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::engine::Regimen;
use crate::error::{Error, Result};
use crate::models::{parse_time_of_day, HistoryFilter, SupplyLevel, Task, TaskDraft, TaskDuration, ONGOING};
use crate::notify::{NotificationService, Trigger};
use crate::reminders::next_occurrence;
use crate::storage::Store;
use crate::supply::classify;

/// Fields for a new task, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct AddArgs {
    pub name: String,
    pub description: Option<String>,
    pub times: Vec<String>,
    pub start: Option<String>,
    pub days: Option<u32>,
    pub color: Option<String>,
    pub no_reminder: bool,
    pub supply: Option<u32>,
    pub total: u32,
    pub refill_at: Option<u32>,
    pub no_refill_reminder: bool,
}

/// Changes to an existing task; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct EditArgs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub times: Vec<String>,
    pub start: Option<String>,
    pub days: Option<u32>,
    pub ongoing: bool,
    pub color: Option<String>,
    pub reminder: Option<bool>,
    pub supply: Option<u32>,
    pub total: Option<u32>,
    pub refill_at: Option<u32>,
    pub refill_reminder: Option<bool>,
}

/// Parses `YYYY-MM-DD` (local midnight) or an RFC 3339 instant.
pub fn parse_start(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        Error::InvalidTaskState(format!("invalid start '{raw}': {e}. Use YYYY-MM-DD."))
    })?;
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidTaskState(format!("no local midnight on {raw}")))
}

/// Finds the task whose id is `id` or uniquely starts with it.
pub async fn resolve_id<S: Store, N: NotificationService>(
    engine: &Regimen<S, N>,
    id: &str,
) -> Result<Task> {
    let tasks = engine.tasks().try_list().await?;
    if let Some(t) = tasks.iter().find(|t| t.id == id) {
        return Ok(t.clone());
    }
    let mut matches = tasks.into_iter().filter(|t| t.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(t), None) => Ok(t),
        (Some(_), Some(_)) => Err(Error::InvalidTaskState(format!(
            "id prefix '{id}' matches several tasks"
        ))),
        _ => Err(Error::TaskNotFound(id.to_string())),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn level_color(level: SupplyLevel) -> Color {
    match level {
        SupplyLevel::Low => Color::Red,
        SupplyLevel::Medium => Color::Yellow,
        SupplyLevel::Good => Color::Green,
    }
}

fn bold_header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
        .collect()
}

/// Adds a new task.
///
/// Without `--days` the task is ongoing. Supply starts full unless given.
pub async fn cmd_add<S: Store, N: NotificationService>(
    engine: &Regimen<S, N>,
    args: AddArgs,
    default_refill_at: u32,
    now: DateTime<Utc>,
    silent: bool,
) -> Result<Task> {
    let start_date = match &args.start {
        Some(raw) => parse_start(raw)?,
        None => now,
    };
    let duration = match args.days {
        Some(days) => TaskDuration::Days(days).to_string(),
        None => ONGOING.to_string(),
    };
    let draft = TaskDraft {
        name: args.name,
        description: args.description.unwrap_or_default(),
        times: args.times,
        start_date,
        duration,
        color: args.color.unwrap_or_else(|| "#1a8e2d".into()),
        reminder_enabled: !args.no_reminder,
        current_supply: args.supply.unwrap_or(args.total),
        total_supply: args.total,
        refill_at: args.refill_at.unwrap_or(default_refill_at),
        refill_reminder: !args.no_refill_reminder && args.total > 0,
    };
    let task = engine.add_task(draft, now).await?;
    if !silent {
        println!("Task added (id = {})", task.id);
    }
    Ok(task)
}

/// Lists all tasks with their schedule and supply.
pub async fn cmd_list<S: Store, N: NotificationService>(engine: &Regimen<S, N>) {
    let tasks = engine.tasks().list().await;
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(bold_header(&[
            "ID", "Name", "Times", "Start", "Duration", "Supply", "Level", "Reminders",
        ]));

    for t in tasks {
        let level = classify(&t);
        let reminders = match (t.reminder_enabled, t.refill_reminder) {
            (true, true) => "daily + refill",
            (true, false) => "daily",
            (false, true) => "refill",
            (false, false) => "off",
        };
        table.add_row(vec![
            Cell::new(short_id(&t.id)),
            Cell::new(&t.name),
            Cell::new(t.times.join(", ")),
            Cell::new(t.start_date.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
            Cell::new(&t.duration),
            Cell::new(format!("{}/{}", t.current_supply, t.total_supply)),
            Cell::new(level).fg(level_color(level)),
            Cell::new(reminders),
        ]);
    }

    println!("{table}");
}

/// Shows today's due tasks and progress.
pub async fn cmd_today<S: Store, N: NotificationService>(engine: &Regimen<S, N>, now: DateTime<Utc>) {
    let agenda = engine.agenda(now).await;
    if agenda.items.is_empty() {
        println!("Nothing due today.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(bold_header(&["ID", "Name", "Description", "Times", "Status"]));

    for item in &agenda.items {
        let (status, color) = if item.done {
            ("Taken", Color::Green)
        } else {
            ("Pending", Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(short_id(&item.task.id)),
            Cell::new(&item.task.name),
            Cell::new(&item.task.description),
            Cell::new(item.task.times.join(", ")),
            Cell::new(status).fg(color),
        ]);
    }

    println!("{table}");
    println!(
        "Progress: {:.0}% ({} of {} doses)",
        agenda.progress.min(1.0) * 100.0,
        agenda.completed,
        agenda.expected()
    );
}

/// Records a dose as taken (`done`) or missed.
pub async fn cmd_record<S: Store, N: NotificationService>(
    engine: &Regimen<S, N>,
    id: &str,
    done: bool,
    now: DateTime<Utc>,
    silent: bool,
) -> Result<()> {
    let task = resolve_id(engine, id).await?;
    engine.record_dose(&task.id, done, now).await?;
    if !silent {
        if done {
            println!("{} marked as taken.", task.name);
        } else {
            println!("{} marked as missed.", task.name);
        }
    }
    Ok(())
}

/// Edits an existing task and reschedules its reminders.
pub async fn cmd_edit<S: Store, N: NotificationService>(
    engine: &Regimen<S, N>,
    id: &str,
    args: EditArgs,
    now: DateTime<Utc>,
    silent: bool,
) -> Result<Task> {
    let mut t = resolve_id(engine, id).await?;
    if let Some(n) = args.name { t.name = n; }
    if let Some(d) = args.description { t.description = d; }
    if !args.times.is_empty() { t.times = args.times; }
    if let Some(s) = args.start { t.start_date = parse_start(&s)?; }
    if args.ongoing {
        t.duration = ONGOING.to_string();
    } else if let Some(days) = args.days {
        t.duration = TaskDuration::Days(days).to_string();
    }
    if let Some(c) = args.color { t.color = c; }
    if let Some(r) = args.reminder { t.reminder_enabled = r; }
    if let Some(total) = args.total { t.total_supply = total; }
    if let Some(s) = args.supply { t.current_supply = s; }
    if let Some(r) = args.refill_at { t.refill_at = r; }
    if let Some(r) = args.refill_reminder { t.refill_reminder = r; }

    let updated = engine.update_task(&t, now).await?;
    if !silent {
        println!("Task {} updated.", short_id(&updated.id));
    }
    Ok(updated)
}

/// Removes a task.
pub async fn cmd_remove<S: Store, N: NotificationService>(
    engine: &Regimen<S, N>,
    id: &str,
    silent: bool,
) -> Result<()> {
    let task = resolve_id(engine, id).await?;
    engine.remove_task(&task.id).await?;
    if !silent {
        println!("Task {} removed.", short_id(&task.id));
    }
    Ok(())
}

/// Records a refill.
pub async fn cmd_refill<S: Store, N: NotificationService>(
    engine: &Regimen<S, N>,
    id: &str,
    now: DateTime<Utc>,
    silent: bool,
) -> Result<()> {
    let task = resolve_id(engine, id).await?;
    let refilled = engine.refill(&task.id, now).await?;
    if !silent {
        println!(
            "{} has been refilled to {} units.",
            refilled.name, refilled.total_supply
        );
    }
    Ok(())
}

/// Shows the supply level of every task.
pub async fn cmd_refills<S: Store, N: NotificationService>(engine: &Regimen<S, N>) {
    let overview = engine.supply_overview().await;
    if overview.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(bold_header(&["ID", "Name", "Supply", "Left", "Refill At", "Status", "Last Refill"]));

    for (t, level) in overview {
        let left = t
            .supply_percentage()
            .map(|p| format!("{p:.0}%"))
            .unwrap_or_else(|_| "-".into());
        let last = t
            .last_refill_date
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        table.add_row(vec![
            Cell::new(short_id(&t.id)),
            Cell::new(&t.name),
            Cell::new(format!("{}/{}", t.current_supply, t.total_supply)),
            Cell::new(left),
            Cell::new(format!("{}%", t.refill_at)),
            Cell::new(level).fg(level_color(level)),
            Cell::new(last),
        ]);
    }

    println!("{table}");
}

/// Shows history grouped by day, newest first.
pub async fn cmd_history<S: Store, N: NotificationService>(engine: &Regimen<S, N>, filter: HistoryFilter) {
    let groups = engine.history_by_day(filter).await;
    if groups.is_empty() {
        println!("No history found.");
        return;
    }

    for group in groups {
        println!("{}", group.day.format("%a %b %d %Y"));
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(bold_header(&["Time", "Task", "Status"]));
        for entry in group.entries {
            let name = entry
                .task
                .map(|t| t.name)
                .unwrap_or_else(|| format!("(removed {})", short_id(&entry.record.task_id)));
            let (status, color) = if entry.record.done {
                ("Taken", Color::Green)
            } else {
                ("Missed", Color::Red)
            };
            table.add_row(vec![
                Cell::new(entry.record.timestamp.with_timezone(&Local).format("%H:%M")),
                Cell::new(name),
                Cell::new(status).fg(color),
            ]);
        }
        println!("{table}");
    }
}

/// Lists scheduled reminders with their next firing time.
pub async fn cmd_reminders<S: Store, N: NotificationService>(
    engine: &Regimen<S, N>,
    now: DateTime<Utc>,
) -> Result<()> {
    let scheduled = engine.reminders().service().list_scheduled().await?;
    if scheduled.is_empty() {
        println!("No reminders scheduled.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(bold_header(&["Task", "Time", "Next", "Message"]));

    let local_now = now.with_timezone(&Local);
    for n in scheduled {
        let Trigger::Daily { hour, minute } = n.trigger;
        let time = format!("{hour:02}:{minute:02}");
        let next = parse_time_of_day(&time)
            .ok()
            .and_then(|t| next_occurrence(t, &local_now))
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        table.add_row(vec![
            Cell::new(short_id(&n.payload.data.task_id)),
            Cell::new(time),
            Cell::new(next),
            Cell::new(n.payload.body),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// Deletes all tasks and history.
pub async fn cmd_reset<S: Store, N: NotificationService>(engine: &Regimen<S, N>, force: bool) -> Result<()> {
    if !force {
        print!("Are you sure you want to delete all tasks and history? This cannot be undone. [y/N] ");
        let mut input = String::new();
        let confirmed = io::stdout().flush().is_ok()
            && io::stdin().read_line(&mut input).is_ok()
            && input.trim().eq_ignore_ascii_case("y");
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    engine.reset().await?;
    println!("All data cleared.");
    Ok(())
}
