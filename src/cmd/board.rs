//! Board commands (`hiring-board show|watch|move|more|add`).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;

use hiring_board::board::create::CandidateForm;
use hiring_board::board::models::SessionUser;
use hiring_board::board::store::CONNECTION_EXHAUSTED;
use hiring_board::board::{
    BoardStore, CandidateStatus, ChannelState, HttpEventSource, HttpGateway, LiveChannel,
    MoveOutcome,
};
use hiring_board::config::BoardConfig;

use super::render;
use crate::{Cli, SessionArgs};

fn load_config(cli: &Cli, project_dir: &Path, session: Option<SessionArgs>) -> Result<BoardConfig> {
    let (name, color) = match session {
        Some(args) => (args.name, args.color),
        None => (None, None),
    };
    let config = BoardConfig::load(project_dir, cli.config.as_deref())?
        .with_env()
        .with_cli_overrides(cli.base_url.clone(), name, color);
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    Ok(config)
}

fn require_session(config: &BoardConfig) -> Result<SessionUser> {
    config
        .session()?
        .context("A session name is required: pass --name or set HIRING_BOARD_USER")
}

fn build_gateway(config: &BoardConfig) -> Result<Arc<HttpGateway>> {
    let gateway = HttpGateway::new(config.base_url(), config.page_size(), config.timeout())
        .context("Failed to build HTTP client")?;
    Ok(Arc::new(gateway))
}

/// Load the job's board, connecting `session` first when given.
async fn open_board(
    gateway: Arc<HttpGateway>,
    job: &str,
    session: Option<SessionUser>,
) -> Result<Arc<BoardStore>> {
    let store = Arc::new(BoardStore::new(gateway, Some(job.to_string()), None));
    match session {
        Some(user) => store.connect_user(Some(user)).await?,
        None => store.load_initial(Some(job.to_string())).await?,
    }
    if let Some(error) = store.snapshot().error {
        bail!(error);
    }
    Ok(store)
}

pub async fn cmd_show(cli: &Cli, project_dir: &Path, job: &str) -> Result<()> {
    let config = load_config(cli, project_dir, None)?;
    let store = open_board(build_gateway(&config)?, job, None).await?;
    render::print_board(&store.snapshot());
    Ok(())
}

pub async fn cmd_more(
    cli: &Cli,
    project_dir: &Path,
    job: &str,
    status: CandidateStatus,
    after: f64,
) -> Result<()> {
    let config = load_config(cli, project_dir, None)?;
    let store = open_board(build_gateway(&config)?, job, None).await?;

    store.load_more_items_on_columns(status, after).await?;
    let snapshot = store.snapshot();
    if let Some(error) = &snapshot.error {
        bail!("{}", error);
    }
    render::print_board(&snapshot);
    Ok(())
}

pub async fn cmd_move(
    cli: &Cli,
    project_dir: &Path,
    job: &str,
    session: SessionArgs,
    candidate: i64,
    status: CandidateStatus,
    index: usize,
) -> Result<()> {
    let config = load_config(cli, project_dir, Some(session))?;
    let user = require_session(&config)?;
    let store = open_board(build_gateway(&config)?, job, Some(user)).await?;

    match store.update_candidate_status(candidate, status, index).await? {
        MoveOutcome::Unchanged => {
            println!("Candidate {} is already in that slot.", candidate);
        }
        MoveOutcome::Committed => {
            println!(
                "{}",
                render::success(&format!("Moved candidate {} to {}", candidate, status.display_name()))
            );
            render::print_board(&store.snapshot());
        }
        MoveOutcome::Superseded => {
            bail!("The board was reloaded before the move was confirmed");
        }
        MoveOutcome::RolledBack => {
            let error = store.snapshot().error.unwrap_or_default();
            bail!(error);
        }
    }
    Ok(())
}

pub async fn cmd_add(
    cli: &Cli,
    project_dir: &Path,
    job: &str,
    session: SessionArgs,
    email: &str,
    status: &str,
) -> Result<()> {
    let config = load_config(cli, project_dir, Some(session))?;
    let user = require_session(&config)?;
    let gateway = build_gateway(&config)?;
    let store = open_board(gateway.clone(), job, Some(user.clone())).await?;

    let mut form = CandidateForm::new(&store.columns()?);
    form.email_has_changed(email);
    form.column_has_changed(status);
    if !form.status_error().is_empty() {
        bail!("{}: {}", form.status_error(), status);
    }

    match form.submit(gateway.as_ref(), Some(job), Some(&user)).await {
        Some(candidate) => {
            println!(
                "{}",
                render::success(&format!("Added {} as candidate {}", candidate.email, candidate.id))
            );
            store.add_candidate(candidate);
            render::print_board(&store.snapshot());
            Ok(())
        }
        None if !form.email_error().is_empty() => bail!("{}", form.email_error()),
        None => bail!("{}", form.form_error()),
    }
}

pub async fn cmd_watch(
    cli: &Cli,
    project_dir: &Path,
    job: &str,
    session: SessionArgs,
) -> Result<()> {
    let config = load_config(cli, project_dir, Some(session))?;
    let user = require_session(&config)?;
    let store = open_board(build_gateway(&config)?, job, Some(user)).await?;

    let source = HttpEventSource::new(config.base_url(), config.timeout())
        .context("Failed to build event stream client")?;
    let handle = LiveChannel::spawn(store.clone(), Arc::new(source), config.reconnect_policy())
        .context("Live updates need both a job and a session")?;

    let mut revisions = store.subscribe();
    render::print_board(&store.snapshot());

    let mut exhausted = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, closing live updates");
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = store.snapshot();
                render::print_board(&snapshot);
                if snapshot.connection == ChannelState::Exhausted {
                    exhausted = true;
                    break;
                }
            }
        }
    }

    handle.shutdown().await;
    if exhausted {
        bail!(CONNECTION_EXHAUSTED);
    }
    Ok(())
}
