use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hiring_board::board::CandidateStatus;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "hiring-board")]
#[command(version, about = "Kanban board client for tracking job candidates")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to board.toml. Defaults to .hiring-board/board.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server API base URL. Overrides board.toml and HIRING_BOARD_URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identity flags shared by commands that change the board.
#[derive(clap::Args, Clone, Debug)]
pub struct SessionArgs {
    /// Display name other viewers see. Falls back to HIRING_BOARD_USER / board.toml
    #[arg(long)]
    pub name: Option<String>,

    /// Avatar color, e.g. "#bae1ff"
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the four columns of a job's board
    Show {
        #[arg(long)]
        job: String,
    },
    /// Follow a job's board live until interrupted
    Watch {
        #[arg(long)]
        job: String,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Move a candidate to a status column at a given slot
    Move {
        #[arg(long)]
        job: String,
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long)]
        candidate: i64,
        /// Target column: new, interview, hired, rejected
        #[arg(long)]
        status: CandidateStatus,
        /// Zero-based slot in the target column
        #[arg(long, default_value = "0")]
        index: usize,
    },
    /// Load the next page of one column
    More {
        #[arg(long)]
        job: String,
        #[arg(long)]
        status: CandidateStatus,
        /// Position of the last loaded card in that column
        #[arg(long)]
        after: f64,
    },
    /// Create a new candidate
    Add {
        #[arg(long)]
        job: String,
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "new")]
        status: String,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default board.toml
    Init,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("hiring_board=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hiring_board=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Show { job } => cmd::cmd_show(&cli, &project_dir, job).await?,
        Commands::Watch { job, session } => {
            cmd::cmd_watch(&cli, &project_dir, job, session.clone()).await?
        }
        Commands::Move {
            job,
            session,
            candidate,
            status,
            index,
        } => {
            cmd::cmd_move(
                &cli,
                &project_dir,
                job,
                session.clone(),
                *candidate,
                *status,
                *index,
            )
            .await?
        }
        Commands::More { job, status, after } => {
            cmd::cmd_more(&cli, &project_dir, job, *status, *after).await?
        }
        Commands::Add {
            job,
            session,
            email,
            status,
        } => cmd::cmd_add(&cli, &project_dir, job, session.clone(), email, status).await?,
        Commands::Config { command } => cmd::cmd_config(&cli, &project_dir, command.clone())?,
    }

    Ok(())
}
