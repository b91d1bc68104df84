//! # Chorust
//!
//! A terminal tool for family chore scheduling. Chore templates are assigned to
//! family members through recurrence rules; a scheduler keeps the next two weeks
//! (configurable) populated with dated assignments.
//!
//! ## Usage
//!
//! ```bash
//! # A chore template for family 1
//! chorust chore add "Feed the cat" --family 1 --points 5
//!
//! # Every Monday and Thursday for member 2, assigned by member 1
//! chorust rule add --chore 1 --assignee 2 --assigner 1 --every weekly --days mon,thu
//!
//! # Last day of every month (clamped in short months)
//! chorust rule add --chore 1 --assignee 2 --assigner 1 --every monthly --day-of-month 31
//!
//! # Upcoming assignments
//! chorust assignments --from 2025-12-01
//!
//! # One scheduler pass now, or keep running it daily
//! chorust run
//! chorust daemon
//! ```
//!
//! Running without arguments opens the interactive TUI.
//!
//! ## Configuration
//!
//! *   `CHORUST_DB`: database path (default `~/.local/share/chorust/chorust.json` on Linux).
//! *   `CHORUST_WINDOW_DAYS`: look-ahead window in days (default 14).
//! *   `CHORUST_TICK_SECS`: daemon period (default one day).
//! *   `RUST_LOG`: log filter (default `info`). Logs go to stderr.

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing::info;

use chorust::commands::*;
use chorust::config::Config;
use chorust::models::{Difficulty, Priority};
use chorust::scheduler::Scheduler;
use chorust::storage::JsonStore;
use chorust::trigger::DailyTrigger;
use chorust::tui::run_tui;

#[derive(Parser)]
#[command(name = "chorust")]
#[command(about = "Recurring chore scheduler for families", long_about = None)]
struct Cli {
    /// Look-ahead window in days (overrides CHORUST_WINDOW_DAYS)
    #[arg(short, long, global = true)]
    window_days: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage chore templates
    Chore {
        #[command(subcommand)]
        command: ChoreCommands,
    },
    /// Manage recurrence rules
    Rule {
        #[command(subcommand)]
        command: RuleCommands,
    },
    /// List assignments sorted by due date
    Assignments {
        /// Only this family
        #[arg(short, long)]
        family: Option<u64>,
        /// First due date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last due date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// Run the scheduler once for today
    Run {
        /// Report what would be created without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the scheduler periodically until interrupted
    Daemon,
    /// Reset the database (delete all chores, rules and assignments)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Open interactive TUI
    Ui,
}

#[derive(Subcommand)]
enum ChoreCommands {
    /// Add a new chore template
    Add {
        /// Chore title (quoted if it has spaces)
        title: String,
        /// Family (tenant) id
        #[arg(short, long)]
        family: u64,
        /// Points awarded on approval
        #[arg(short, long, default_value_t = 1)]
        points: u32,
        #[arg(short, long, value_enum, default_value_t = Difficulty::Easy)]
        difficulty: Difficulty,
        /// Expected duration in minutes
        #[arg(short, long)]
        minutes: Option<u32>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List chore templates
    List {
        #[arg(short, long)]
        family: Option<u64>,
    },
    /// Deactivate a chore template; its rules stop generating
    Deactivate { id: u64 },
    /// Reactivate a chore template
    Activate { id: u64 },
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Add a recurrence rule and generate its first window
    Add {
        /// Chore template id
        #[arg(short, long)]
        chore: u64,
        /// Member the chore is assigned to
        #[arg(short, long)]
        assignee: u64,
        /// Member assigning the chore
        #[arg(long)]
        assigner: u64,
        /// Recurrence (daily, weekly, monthly)
        #[arg(short, long)]
        every: String,
        /// Weekdays for weekly rules, e.g. mon,thu or 1,4
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
        /// Day of month for monthly rules (clamped to the month's last day)
        #[arg(long)]
        day_of_month: Option<u32>,
        /// First valid date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last valid date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
    },
    /// List recurrence rules
    List {
        #[arg(short, long)]
        family: Option<u64>,
    },
    /// Deactivate a recurrence rule
    Deactivate { id: u64 },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    let mut config = Config::from_env();
    if let Some(days) = cli.window_days {
        config.window_days = days;
    }
    if let Err(e) = dispatch(cli.command, &config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn dispatch(command: Option<Commands>, config: &Config) -> Result<()> {
    let store = JsonStore::new(&config.db_path);
    match command {
        Some(Commands::Chore { command }) => match command {
            ChoreCommands::Add { title, family, points, difficulty, minutes, description } => {
                cmd_chore_add(&store, new_chore(family, title, description, points, difficulty, minutes)?, false)?;
            }
            ChoreCommands::List { family } => cmd_chore_list(&store, family)?,
            ChoreCommands::Deactivate { id } => cmd_chore_set_active(&store, id, false, false)?,
            ChoreCommands::Activate { id } => cmd_chore_set_active(&store, id, true, false)?,
        },
        Some(Commands::Rule { command }) => match command {
            RuleCommands::Add { chore, assignee, assigner, every, days, day_of_month, start, end, priority } => {
                let tenant_id = store.load()?
                    .chore(chore)
                    .map(|c| c.tenant_id)
                    .ok_or_else(|| anyhow::anyhow!("Chore {} not found.", chore))?;
                let args = RuleArgs {
                    tenant_id,
                    chore_id: chore,
                    assignee_id: assignee,
                    assigner_id: assigner,
                    every,
                    days,
                    day_of_month,
                    start,
                    end,
                    priority,
                };
                cmd_rule_add(&store, config.window_days, args, false)?;
            }
            RuleCommands::List { family } => cmd_rule_list(&store, family)?,
            RuleCommands::Deactivate { id } => cmd_rule_deactivate(&store, id, false)?,
        },
        Some(Commands::Assignments { family, from, to }) => cmd_assignments(&store, family, from, to)?,
        Some(Commands::Run { dry_run }) => {
            cmd_run(&store, config.window_days, dry_run, false)?;
        }
        Some(Commands::Daemon) => run_daemon(store, config)?,
        Some(Commands::Reset { force }) => cmd_reset(&store, force)?,
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "chorust", &mut io::stdout());
        }
        Some(Commands::Ui) | None => {
            if let Err(e) = run_tui(store, config.window_days) {
                eprintln!("Error running TUI: {}", e);
            }
        }
    }
    Ok(())
}

fn run_daemon(store: JsonStore, config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        info!(db = %store.path().display(), "starting chorust daemon");
        let scheduler = Scheduler::new(store).with_window_days(config.window_days);
        let handle = DailyTrigger::new(scheduler, config.tick_interval).spawn();
        tokio::signal::ctrl_c().await?;
        info!("shutting down");
        handle.abort();
        Ok::<(), anyhow::Error>(())
    })
}
