use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use jobstatus::config::{CONFIG_FILE, Config};

mod cmd;

#[derive(Parser)]
#[command(name = "jobstatus")]
#[command(version, about = "Job status tracker with derived project health and task urgency")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Database path (overrides config and JOBSTATUS_DB_PATH)
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Session file used by client commands
    #[arg(long, global = true, env = "JOBSTATUS_SESSION", hide = true)]
    pub session: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Permissive CORS for local front-end development
        #[arg(long)]
        dev: bool,

        /// Pin the calendar day used for urgency and age (YYYY-MM-DD)
        #[arg(long, value_parser = parse_day)]
        today: Option<NaiveDate>,
    },
    /// Create the database
    Init {
        /// Also create demo users and assignees
        #[arg(long)]
        seed: bool,
    },
    /// Manage user accounts directly in the database
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Log in to a running server and save the session
    Login {
        #[arg(long, default_value = "http://127.0.0.1:5001")]
        server: String,
        username: String,
        password: String,
    },
    /// Forget the saved session
    Logout,
    /// List projects with their derived status
    Projects {
        /// Show archived projects instead of active ones
        #[arg(long)]
        archived: bool,
    },
    /// Show overdue and due-soon tasks
    Due,
}

#[derive(Subcommand, Clone)]
pub enum UserCommands {
    /// Create a user
    Add {
        username: String,

        #[arg(long, default_value = "user")]
        role: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        password: String,
    },
    /// Reset a user's password
    Passwd { username: String, password: String },
    /// List users
    List,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Check configuration for problems
    Validate,
    /// Write a default jobstatus.toml
    Init,
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    jobstatus::status::parse_calendar_date(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::resolve(&cli.config)?;
    if let Some(db_path) = &cli.db_path {
        config.server.db_path = db_path.clone();
    }
    jobstatus::logging::init(&config.logging, cli.verbose);

    match &cli.command {
        Commands::Serve {
            port,
            host,
            dev,
            today,
        } => {
            cmd::cmd_serve(&config, *port, host.clone(), *dev, *today).await?;
        }
        Commands::Init { seed } => cmd::cmd_init(&config, *seed)?,
        Commands::User { command } => cmd::cmd_user(&config, command.clone())?,
        Commands::Config { command } => cmd::cmd_config(&cli.config, &config, command.clone())?,
        Commands::Login {
            server,
            username,
            password,
        } => {
            let session_path = cmd::session_path(cli.session.as_deref())?;
            cmd::cmd_login(&session_path, server, username, password).await?;
        }
        Commands::Logout => {
            let session_path = cmd::session_path(cli.session.as_deref())?;
            cmd::cmd_logout(&session_path)?;
        }
        Commands::Projects { archived } => {
            let session_path = cmd::session_path(cli.session.as_deref())?;
            cmd::cmd_projects(&session_path, *archived).await?;
        }
        Commands::Due => {
            let session_path = cmd::session_path(cli.session.as_deref())?;
            cmd::cmd_due(&session_path).await?;
        }
    }

    Ok(())
}
