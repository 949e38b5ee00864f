use std::env;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::*;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use wbs::config::{Config, ConfigError};
use wbs::models::board::BoardPosition;
use wbs::models::patch::NodePatch;
use wbs::models::status::Canonical;
use wbs::models::wire::parse_date;
use wbs::services::session::{CollaboratorError, Session, UpdateError};
use wbs::services::stats::TreeStats;
use wbs::services::tree;
use wbs::storage::collaborator::SnapshotCollaborator;
use wbs::storage::json::JsonFileStorage;
use wbs::storage::{Storage, StorageError};

mod ui;

type FileSession = Session<SnapshotCollaborator<JsonFileStorage>>;

#[derive(Parser)]
#[command(name = "wbs", about = "Work-breakdown trees, schedules and boards in your terminal")]
struct Cli {
    /// Snapshot file to work on
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the work-breakdown tree
    Tree {
        /// Include deleted nodes
        #[arg(long)]
        all: bool,
    },

    /// Show one node
    Show { id: String },

    /// Move a node (with its subtree) under another parent
    Move {
        id: String,

        /// New parent; root level when omitted
        #[arg(long)]
        parent: Option<String>,

        /// Position among the new siblings
        #[arg(long)]
        position: usize,
    },

    /// Update fields of a node
    Set {
        id: String,

        #[arg(long)]
        title: Option<String>,

        /// Status, canonical or any known label
        #[arg(long)]
        status: Option<String>,

        /// Priority, canonical or any known label
        #[arg(long)]
        priority: Option<String>,

        /// Start date (YYYY-MM-DD, or "none" to clear)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD, or "none" to clear)
        #[arg(long)]
        end: Option<String>,

        /// Estimated effort in hours
        #[arg(long)]
        hours: Option<f64>,

        /// Replace the dependencies (can be used multiple times)
        #[arg(long = "depends-on", action = clap::ArgAction::Append)]
        depends_on: Vec<String>,

        /// Service catalog entry ("none" to clear)
        #[arg(long)]
        service: Option<String>,

        /// Service multiplier
        #[arg(long)]
        multiplier: Option<f64>,

        /// Duration in days
        #[arg(long)]
        duration: Option<i64>,
    },

    /// Preview the dates a node would get from its dependencies
    Schedule { id: String },

    /// Reschedule everything that depends on a node
    Propagate { id: String },

    /// Recompute every WBS code from tree position
    Renumber,

    /// Reorder the children of one parent
    Reorder {
        /// Parent whose children are reordered; the roots when omitted
        #[arg(long)]
        parent: Option<String>,

        /// Child ids in their new order
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show the status board
    Board,

    /// Move a card on the board
    BoardMove {
        task: String,

        #[arg(long, num_args = 2, value_names = ["COLUMN", "INDEX"])]
        from: Vec<String>,

        #[arg(long, num_args = 2, value_names = ["COLUMN", "INDEX"])]
        to: Vec<String>,

        /// Status for the card; derived from the target column when omitted
        #[arg(long)]
        status: Option<String>,
    },

    /// Show how labels normalize to canonical values
    Normalize {
        #[arg(required = true)]
        values: Vec<String>,

        /// Use the priority vocabulary
        #[arg(long)]
        priority: bool,
    },

    /// Show totals over the active tree
    Stats,

    /// Replace the snapshot with a backend export or another snapshot
    Import { file: PathBuf },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error("Node '{0}' not found")]
    UnknownNode(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid board position '{0}', expected a column id and an index")]
    InvalidPosition(String),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WBS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "wbs=debug,info"
        } else {
            "wbs=info,warn"
        })
    });

    let format = env::var("WBS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wbs")
        .join("snapshot.json")
}

/// "none" (or an empty value) clears a date.
fn date_arg(raw: &str) -> Result<Option<jiff::civil::Date>, CliError> {
    if raw.trim().is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    parse_date(raw)
        .map(Some)
        .ok_or_else(|| CliError::InvalidDate(raw.to_string()))
}

fn position_arg(raw: &[String]) -> Result<BoardPosition, CliError> {
    let invalid = || CliError::InvalidPosition(raw.join(" "));
    let [column, index] = raw else {
        return Err(invalid());
    };
    let index = index.parse::<usize>().map_err(|_| invalid())?;
    Ok(BoardPosition::new(column.clone(), index))
}

fn open_session(snapshot_path: &Path, config: &Config) -> Result<FileSession, CliError> {
    let statuses = config.statuses()?;
    let priorities = config.priorities()?;
    let scheduler = config.scheduler();

    let storage = JsonFileStorage::new(snapshot_path.to_path_buf());
    let collaborator = SnapshotCollaborator::new(storage, statuses.clone(), scheduler);
    Ok(Session::open(collaborator, statuses, priorities, scheduler)?)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;
    let snapshot_path = cli.file.unwrap_or_else(default_snapshot_path);
    debug!(snapshot = %snapshot_path.display(), config = %config_path.display(), "starting");

    match cli.command.unwrap_or(Commands::Tree { all: false }) {
        Commands::Import { file } => {
            // Older exports are migrated on load.
            let snapshot = JsonFileStorage::new(file).load()?;
            JsonFileStorage::new(snapshot_path).save(&snapshot)?;
            println!("✓ Imported {} nodes", snapshot.nodes.len());
            Ok(())
        }
        command => {
            let mut session = open_session(&snapshot_path, &config)?;
            run_command(command, &mut session)
        }
    }
}

fn run_command(command: Commands, session: &mut FileSession) -> Result<(), CliError> {
    match command {
        Commands::Tree { all } => {
            let forest = if all {
                session.forest().to_vec()
            } else {
                tree::active(session.forest())
            };
            if forest.is_empty() {
                println!("No nodes");
            } else {
                ui::render_view_header("Work breakdown", tree::count(&forest));
                ui::render_tree(&forest);
                println!();
            }
        }
        Commands::Show { id } => {
            let node = session.find(&id).ok_or(CliError::UnknownNode(id))?;
            ui::render_node_details(node, session.statuses(), session.priorities());
        }
        Commands::Move {
            id,
            parent,
            position,
        } => {
            session.move_node(&id, parent.as_deref(), position)?;
            println!("✓ Moved {}", id);
        }
        Commands::Set {
            id,
            title,
            status,
            priority,
            start,
            end,
            hours,
            depends_on,
            service,
            multiplier,
            duration,
        } => {
            let changes = NodePatch {
                title,
                status: session.statuses().normalize(status.as_deref()),
                priority: session.priorities().normalize(priority.as_deref()),
                start_date: start.as_deref().map(date_arg).transpose()?,
                end_date: end.as_deref().map(date_arg).transpose()?,
                estimate_hours: hours.map(Some),
                dependencies: (!depends_on.is_empty()).then_some(depends_on),
                service_catalog_id: service.map(|s| (!s.eq_ignore_ascii_case("none")).then_some(s)),
                service_multiplier: multiplier.map(Some),
                ..NodePatch::default()
            };

            let sent = session.update_node(&id, changes)?;
            let sent = match duration {
                Some(days) => session.set_duration(&id, days)?,
                None => sent,
            };
            if sent.is_empty() {
                println!("Nothing to update");
            } else {
                println!("✓ Updated {}", id);
            }
        }
        Commands::Schedule { id } => {
            let node = session.find(&id).ok_or_else(|| CliError::UnknownNode(id.clone()))?;
            match session.schedule_preview(&id) {
                Some(schedule) => ui::render_schedule(node, &schedule),
                None => println!("No dated dependencies"),
            }
        }
        Commands::Propagate { id } => {
            let shifts = session.propagate(&id)?;
            ui::render_shifts(&shifts);
        }
        Commands::Renumber => {
            let changed = session.renumber()?;
            println!("✓ Renumbered {} nodes", changed);
        }
        Commands::Reorder { parent, ids } => {
            session.reorder_siblings(parent.as_deref(), &ids)?;
            println!("✓ Reordered {} nodes", ids.len());
        }
        Commands::Board => {
            ui::render_board(session.board());
        }
        Commands::BoardMove {
            task,
            from,
            to,
            status,
        } => {
            let from = position_arg(&from)?;
            let to = position_arg(&to)?;
            if session.move_board_task(&task, &from, &to, status.as_deref())? {
                println!("✓ Moved {} to {}", task, to.column_id);
            } else {
                println!("Nothing to move");
            }
        }
        Commands::Normalize { values, priority } => {
            for value in values {
                let canonical = if priority {
                    session.priorities().normalize(Some(&value)).map(|p| p.as_str())
                } else {
                    session.statuses().normalize(Some(&value)).map(|s| s.as_str())
                };
                println!("  {} {} {}", value, "→".dimmed(), canonical.unwrap_or("-").bold());
            }
        }
        Commands::Stats => {
            ui::render_stats(&TreeStats::collect(session.forest()), session.statuses());
        }
        Commands::Import { .. } => unreachable!("imports run without a session"),
    }

    Ok(())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
