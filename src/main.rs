//! # regimen
//!
//! Terminal front-end for the regimen engine: recurring medication-style
//! tasks with daily reminders, a taken/missed history and refill tracking.
//!
//! ## Usage
//!
//! ```bash
//! # Ongoing task taken twice a day, 60 tablets, warn at 25%
//! regimen add "Metformin" --description "500mg" --time 08:00 --time 20:00 --total 60 --refill-at 25
//!
//! # A ten day course starting on a given date
//! regimen add "Amoxicillin" --time 09:00 --start 2025-06-01 --days 10 --total 30
//!
//! regimen today            # what is due today and progress
//! regimen take <ID>        # record a taken dose (id prefix is enough)
//! regimen skip <ID>        # record a missed dose
//! regimen refill <ID>      # supply back to full
//! regimen refills          # supply levels
//! regimen history --filter missed
//! regimen reminders        # scheduled daily reminders
//! ```
//!
//! ## Data Storage
//!
//! Collections are JSON files in the local data directory
//! (`~/.local/share/regimen` on Linux). Override with `--data-dir` or
//! `REGIMEN_DATA_DIR`. Settings live in `~/.config/regimen/config.toml`.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use regimen::commands::*;
use regimen::config::{Config, Overrides};
use regimen::models::HistoryFilter;
use regimen::notify::NotificationCenter;
use regimen::storage::JsonFileStore;
use regimen::Regimen;

#[derive(Parser)]
#[command(name = "regimen")]
#[command(about = "Medication schedule, history and refill tracker", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/regimen/config.toml)
    #[arg(long, global = true, env = "REGIMEN_CONFIG")]
    config: Option<PathBuf>,
    /// Directory holding the data files
    #[arg(long, global = true, env = "REGIMEN_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Log filter, e.g. "debug" (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "REGIMEN_LOG")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task name (quoted if it has spaces)
        name: String,
        /// Dosage or instructions
        #[arg(short, long)]
        description: Option<String>,
        /// Daily time as HH:MM; repeat for several doses a day
        #[arg(short, long = "time")]
        times: Vec<String>,
        /// Start date (YYYY-MM-DD or RFC 3339); defaults to now
        #[arg(short, long)]
        start: Option<String>,
        /// Length of the course in days; omit for ongoing
        #[arg(long)]
        days: Option<u32>,
        /// Display color
        #[arg(long)]
        color: Option<String>,
        /// Do not schedule daily reminders
        #[arg(long)]
        no_reminder: bool,
        /// Doses currently on hand (defaults to --total)
        #[arg(long)]
        supply: Option<u32>,
        /// Doses in a full supply
        #[arg(long, default_value_t = 0)]
        total: u32,
        /// Supply percentage that counts as low
        #[arg(long)]
        refill_at: Option<u32>,
        /// Do not send low supply alerts
        #[arg(long)]
        no_refill_reminder: bool,
    },
    /// List all tasks
    List,
    /// Show what is due today
    Today,
    /// Record a dose as taken
    Take {
        id: String,
    },
    /// Record a dose as missed
    Skip {
        id: String,
    },
    /// Edit a task
    Edit {
        id: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// Replace the daily times
        #[arg(short, long = "time")]
        times: Vec<String>,
        /// New start date
        #[arg(short, long)]
        start: Option<String>,
        /// New length in days
        #[arg(long, conflicts_with = "ongoing")]
        days: Option<u32>,
        /// Make the task ongoing
        #[arg(long)]
        ongoing: bool,
        /// New color
        #[arg(long)]
        color: Option<String>,
        /// Turn daily reminders on or off
        #[arg(long)]
        reminder: Option<bool>,
        /// Doses on hand
        #[arg(long)]
        supply: Option<u32>,
        /// Doses in a full supply
        #[arg(long)]
        total: Option<u32>,
        /// Low supply percentage
        #[arg(long)]
        refill_at: Option<u32>,
        /// Turn low supply alerts on or off
        #[arg(long)]
        refill_reminder: Option<bool>,
    },
    /// Remove a task
    Remove {
        id: String,
    },
    /// Record a refill
    Refill {
        id: String,
    },
    /// Show supply levels
    Refills,
    /// Show history by day
    History {
        #[arg(short, long, value_enum, default_value_t = HistoryFilter::All)]
        filter: HistoryFilter,
    },
    /// List scheduled reminders
    Reminders,
    /// Delete all tasks and history
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "regimen", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let overrides = Overrides {
        config_path: cli.config,
        data_dir: cli.data_dir,
        log_level: cli.log_level,
    };
    let config = match Config::load(&overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_level);

    let store = Arc::new(JsonFileStore::new(config.data_dir.clone()));
    let center = NotificationCenter::new(Arc::clone(&store), config.notifications);
    let engine = Regimen::new(store, center);

    let now = Utc::now();
    engine.start(now).await;
    let result = run(&engine, cli.command, &config).await;
    engine.shutdown().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    engine: &Regimen<JsonFileStore, NotificationCenter<JsonFileStore>>,
    command: Option<Commands>,
    config: &Config,
) -> regimen::Result<()> {
    let now = Utc::now();
    match command {
        Some(Commands::Add {
            name,
            description,
            times,
            start,
            days,
            color,
            no_reminder,
            supply,
            total,
            refill_at,
            no_refill_reminder,
        }) => {
            let args = AddArgs {
                name,
                description,
                times,
                start,
                days,
                color,
                no_reminder,
                supply,
                total,
                refill_at,
                no_refill_reminder,
            };
            cmd_add(engine, args, config.default_refill_at, now, false).await?;
        }
        Some(Commands::List) => cmd_list(engine).await,
        Some(Commands::Today) | None => cmd_today(engine, now).await,
        Some(Commands::Take { id }) => cmd_record(engine, &id, true, now, false).await?,
        Some(Commands::Skip { id }) => cmd_record(engine, &id, false, now, false).await?,
        Some(Commands::Edit {
            id,
            name,
            description,
            times,
            start,
            days,
            ongoing,
            color,
            reminder,
            supply,
            total,
            refill_at,
            refill_reminder,
        }) => {
            let args = EditArgs {
                name,
                description,
                times,
                start,
                days,
                ongoing,
                color,
                reminder,
                supply,
                total,
                refill_at,
                refill_reminder,
            };
            cmd_edit(engine, &id, args, now, false).await?;
        }
        Some(Commands::Remove { id }) => cmd_remove(engine, &id, false).await?,
        Some(Commands::Refill { id }) => cmd_refill(engine, &id, now, false).await?,
        Some(Commands::Refills) => cmd_refills(engine).await,
        Some(Commands::History { filter }) => cmd_history(engine, filter).await,
        Some(Commands::Reminders) => cmd_reminders(engine, now).await?,
        Some(Commands::Reset { force }) => cmd_reset(engine, force).await?,
        Some(Commands::Completions { .. }) => {}
    }
    Ok(())
}
