//! shivir-at - Shivir attendance tracker
//!
//! Command-line front end for the attendance engine: identity and session
//! administration, marking attendance from a face probe or by email, and
//! daily statistics.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use shivir_common::config::{database_path, RootFolderResolver, TomlConfig};
use shivir_common::db::init_database;
use shivir_common::events::{EventBus, ShivirEvent};
use shivir_common::time::{self, calendar_date};
use shivir_common::{Embedding, SessionType};
use shivir_at::db::people::{self, NewPerson};
use shivir_at::db::sessions::{self, NewSession};
use shivir_at::db::stats;
use shivir_at::messages;
use shivir_at::{load_engine_config, AttendanceEngine};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "shivir-at", version, about = "Shivir face-recognition attendance tracker")]
struct Cli {
    /// Root folder holding shivir.db (overrides SHIVIR_ROOT_FOLDER and config file)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and default settings
    Init,
    /// Identity administration
    #[command(subcommand)]
    Person(PersonCommand),
    /// Session administration
    #[command(subcommand)]
    Session(SessionCommand),
    /// Mark attendance for the active session
    Mark(MarkArgs),
    /// Attendance statistics for one calendar day
    Stats {
        /// Day to report (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
enum PersonCommand {
    /// Register a new person
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        city: String,
        /// 'M' or 'F'
        #[arg(long, default_value = "M")]
        gender: String,
        /// Face embedding as a JSON array, or @path to a file holding one
        #[arg(long)]
        embedding: Option<String>,
        /// Level already reached before registration
        #[arg(long)]
        level: Option<String>,
    },
    Activate {
        email: String,
    },
    Deactivate {
        email: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Blacklist {
        email: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Unblacklist {
        email: String,
    },
    /// Show a person with their progress and repeat visits
    Show {
        email: String,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Create a session
    Create {
        #[arg(long)]
        name: String,
        /// MA, SSP1, SSP2, HS1, HS2 or FESTIVAL
        #[arg(long = "type")]
        session_type: SessionType,
        /// Session date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = sessions::DEFAULT_CONDUCTOR)]
        conducted_by: String,
        /// Make this the active session
        #[arg(long)]
        activate: bool,
    },
    /// Make a session the only active one
    Activate {
        id: Uuid,
    },
    DeactivateAll,
    /// Show the active session
    Active,
    List,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct MarkArgs {
    /// Probe embedding as a JSON array, or @path to a file holding one
    #[arg(long)]
    probe: Option<String>,
    /// Mark an already-identified person
    #[arg(long)]
    email: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let toml_config = TomlConfig::load_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting shivir-at v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(cli.root_folder.clone())
        .with_toml(toml_config)
        .resolve();
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match cli.command {
        Command::Init => {
            println!("Database ready: {}", db_path.display());
        }
        Command::Person(cmd) => run_person(&pool, cmd).await?,
        Command::Session(cmd) => run_session(&pool, cmd).await?,
        Command::Mark(args) => run_mark(&pool, args).await?,
        Command::Stats { date } => {
            let config = load_engine_config(&pool).await?;
            let date = date.unwrap_or_else(|| calendar_date(time::now(), config.calendar_offset));
            let stats = stats::attendance_stats(&pool, date, config.calendar_offset).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

async fn person_by_email(pool: &SqlitePool, email: &str) -> Result<Uuid> {
    people::find_by_email(pool, email)
        .await?
        .map(|p| p.id)
        .ok_or_else(|| anyhow!("No person registered with email {}", email))
}

fn parse_embedding(arg: &str) -> Result<Embedding> {
    let json = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read embedding file {}", path))?,
        None => arg.to_string(),
    };
    let values: Vec<f64> = serde_json::from_str(&json).context("Embedding must be a JSON array of numbers")?;
    if values.is_empty() {
        bail!("Embedding must not be empty");
    }
    Ok(Embedding::new(values))
}

async fn run_person(pool: &SqlitePool, cmd: PersonCommand) -> Result<()> {
    let now = time::now();
    match cmd {
        PersonCommand::Add {
            name,
            email,
            city,
            gender,
            embedding,
            level,
        } => {
            let mut new_person = NewPerson::new(name, email).with_city(city).with_gender(gender);
            if let Some(embedding) = embedding {
                new_person = new_person.with_embedding(parse_embedding(&embedding)?);
            }
            if let Some(level) = level {
                new_person = new_person.with_level(level);
            }
            let person = people::insert_person(pool, &new_person).await?;
            println!("{}", serde_json::to_string_pretty(&person)?);
        }
        PersonCommand::Activate { email } => {
            people::activate(pool, person_by_email(pool, &email).await?).await?;
        }
        PersonCommand::Deactivate { email, reason } => {
            let id = person_by_email(pool, &email).await?;
            people::deactivate(pool, id, reason.as_deref(), now).await?;
        }
        PersonCommand::Blacklist { email, reason } => {
            let id = person_by_email(pool, &email).await?;
            people::blacklist(pool, id, reason.as_deref(), now).await?;
        }
        PersonCommand::Unblacklist { email } => {
            people::unblacklist(pool, person_by_email(pool, &email).await?).await?;
        }
        PersonCommand::Show { email } => {
            let id = person_by_email(pool, &email).await?;
            let report = stats::progress_report(pool, id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

async fn run_session(pool: &SqlitePool, cmd: SessionCommand) -> Result<()> {
    match cmd {
        SessionCommand::Create {
            name,
            session_type,
            date,
            conducted_by,
            activate,
        } => {
            let config = load_engine_config(pool).await?;
            let date = date.unwrap_or_else(|| calendar_date(time::now(), config.calendar_offset));
            let new_session = NewSession::new(name, session_type, date).conducted_by(conducted_by);
            let session = sessions::create_session(pool, &new_session, activate).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionCommand::Activate { id } => {
            let session = sessions::activate_session(pool, id).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionCommand::DeactivateAll => {
            let count = sessions::deactivate_all_sessions(pool).await?;
            println!("Deactivated {} session(s)", count);
        }
        SessionCommand::Active => match sessions::get_active_session(pool).await? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => println!("No active session"),
        },
        SessionCommand::List => {
            let all = sessions::list_sessions(pool).await?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
    }
    Ok(())
}

async fn run_mark(pool: &SqlitePool, args: MarkArgs) -> Result<()> {
    let config = load_engine_config(pool).await?;
    let events = Arc::new(EventBus::new(config.event_bus_capacity));
    let engine = AttendanceEngine::new(pool.clone(), config, events);

    let active = sessions::get_active_session(pool).await?;

    let mut rx = engine.events().subscribe();
    let outcome = match (args.probe, args.email) {
        (Some(probe), _) => engine.mark_face(&parse_embedding(&probe)?, active.as_ref()).await?,
        (None, Some(email)) => engine.mark_email(&email, active.as_ref()).await?,
        (None, None) => bail!("Either --probe or --email is required"),
    };

    let mut name = None;
    while let Ok(event) = rx.try_recv() {
        if let ShivirEvent::AttendanceOutcome { person_name, .. } = event {
            name = person_name;
        }
    }

    let message = messages::compose(&outcome, name.as_deref(), active.as_ref().map(|s| s.session_type));
    println!("{}", message.english);
    println!("{}", message.hindi);
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}
