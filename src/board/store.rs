//! The client-side board state for one job.
//!
//! `BoardStore` owns the loaded candidates and every entry point that
//! mutates them. State lives behind a plain mutex that is never held across
//! an `.await`: each operation does its synchronous bookkeeping, releases the
//! lock, talks to the gateway, then re-locks to commit or roll back. Other
//! callers (pushed events, further moves) may interleave at those points.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::columns::{self, Column};
use super::events::CandidateEvent;
use super::gateway::{CandidateGateway, CandidateUpdate};
use super::live::ChannelState;
use super::models::{Candidate, CandidateStatus, ColumnCounts, Job, SessionUser};
use super::position;
use super::reconcile::{self, Reconciliation};
use crate::errors::BoardError;

pub const STATUS_CHANGE_FAILED: &str = "Error: status cannot be changed";
pub const NEXT_PAGE_FAILED: &str = "Error: can't fetch next item";
pub const CONNECTION_EXHAUSTED: &str =
    "Connection to the board was lost. Please refresh the page to reconnect";
/// Job name shown until a job has loaded.
pub const JOB_PLACEHOLDER_NAME: &str = "Not Found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Board data could not be loaded; only a new load clears it.
    Load,
    /// A single operation failed; prior good state is still shown.
    Recoverable,
    /// Live updates gave up reconnecting.
    Connection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayError {
    pub message: String,
    pub kind: ErrorKind,
}

impl DisplayError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// Everything the board knows about the current job.
#[derive(Debug, Clone)]
pub struct BoardState {
    pub job_id: Option<String>,
    pub job: Option<Job>,
    pub is_loading: bool,
    pub error: Option<DisplayError>,
    /// Loaded candidates, unique by id, in arrival order.
    pub candidates: Vec<Candidate>,
    pub column_counts: ColumnCounts,
    pub session: Option<SessionUser>,
    pub connection: ChannelState,
}

impl BoardState {
    pub fn new(job_id: Option<String>, session: Option<SessionUser>) -> Self {
        Self {
            job_id,
            job: None,
            is_loading: true,
            error: None,
            candidates: Vec::new(),
            column_counts: ColumnCounts::new(),
            session,
            connection: ChannelState::Disconnected,
        }
    }

    /// Id of the job whose data is on the board, if any loaded.
    pub fn loaded_job_id(&self) -> Option<&str> {
        self.job.as_ref().and(self.job_id.as_deref())
    }

    pub fn job_name(&self) -> &str {
        self.job
            .as_ref()
            .map(|j| j.name.as_str())
            .unwrap_or(JOB_PLACEHOLDER_NAME)
    }

    pub fn find(&self, candidate_id: i64) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    fn find_mut(&mut self, candidate_id: i64) -> Option<&mut Candidate> {
        self.candidates.iter_mut().find(|c| c.id == candidate_id)
    }

    fn clear_recoverable_error(&mut self) {
        if self
            .error
            .as_ref()
            .is_some_and(|e| e.kind == ErrorKind::Recoverable)
        {
            self.error = None;
        }
    }
}

/// Read-only view handed to presentation code.
#[derive(Debug)]
pub struct BoardSnapshot {
    pub is_loading: bool,
    pub error: Option<String>,
    pub job_name: String,
    pub columns: Result<[Column; 4], BoardError>,
    pub connection: ChannelState,
    pub session: Option<SessionUser>,
}

/// Result of a status/position change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Dropped back onto its own slot; nothing was sent.
    Unchanged,
    Committed,
    /// The server refused the change and the candidate was restored.
    RolledBack,
    /// The board was reloaded before the server answered; the reply was dropped.
    Superseded,
}

pub struct BoardStore {
    gateway: Arc<dyn CandidateGateway>,
    state: Mutex<BoardState>,
    revision: watch::Sender<u64>,
    /// Job the board is following; live channels close when it changes.
    job_watch: watch::Sender<Option<String>>,
    load_generation: AtomicU64,
    loads_in_flight: AtomicUsize,
}

impl BoardStore {
    pub fn new(
        gateway: Arc<dyn CandidateGateway>,
        job_id: Option<String>,
        session: Option<SessionUser>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        let (job_watch, _) = watch::channel(job_id.clone());
        Self {
            gateway,
            state: Mutex::new(BoardState::new(job_id, session)),
            revision,
            job_watch,
            load_generation: AtomicU64::new(0),
            loads_in_flight: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn update<R>(&self, f: impl FnOnce(&mut BoardState) -> R) -> R {
        let result = f(&mut self.lock());
        self.publish();
        result
    }

    fn is_current(&self, generation: u64) -> bool {
        self.load_generation.load(Ordering::SeqCst) == generation
    }

    // ── Session & loading ────────────────────────────────────────────

    /// Set (or clear) who is driving the board.
    ///
    /// A new identity triggers the initial load when no job data is on the
    /// board yet. Clearing it keeps loaded data in memory.
    pub async fn connect_user(&self, user: Option<SessionUser>) -> Result<(), BoardError> {
        let needs_load = self.update(|s| {
            s.session = user;
            match &s.session {
                Some(user) => {
                    info!(user = %user.name, "session connected");
                    s.job.is_none() && self.loads_in_flight.load(Ordering::SeqCst) == 0
                }
                None => {
                    info!("session cleared");
                    false
                }
            }
        });

        if needs_load {
            let job_id = self.lock().job_id.clone();
            self.load_initial(job_id).await?;
        }
        Ok(())
    }

    /// Fetch the job and its first candidate page concurrently.
    ///
    /// A missing job id is returned as an error and recorded on the board.
    /// Fetch failures are only recorded: the job failure is reported first
    /// when both fail. A load superseded by a newer one is discarded, and so
    /// are page and move replies that were requested before this load.
    ///
    /// Switching to another job drops the connection status; live channels
    /// following the previous job shut themselves down.
    pub async fn load_initial(&self, job_id: Option<String>) -> Result<(), BoardError> {
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let job_id = job_id.filter(|id| !id.trim().is_empty());
        self.update(|s| {
            if s.job_id != job_id {
                s.connection = ChannelState::Disconnected;
            }
            s.job_id = job_id.clone();
            s.job = None;
            s.candidates.clear();
            s.column_counts.clear();
            s.is_loading = job_id.is_some();
            s.error = if job_id.is_some() {
                None
            } else {
                Some(DisplayError::new(
                    ErrorKind::Load,
                    BoardError::JobIdRequired.to_string(),
                ))
            };
        });
        self.job_watch.send_if_modified(|current| {
            if *current == job_id {
                return false;
            }
            current.clone_from(&job_id);
            true
        });
        let Some(job_id) = job_id else {
            return Err(BoardError::JobIdRequired);
        };

        info!(%job_id, "loading board");
        self.loads_in_flight.fetch_add(1, Ordering::SeqCst);
        let (job, page) = tokio::join!(
            self.gateway.get_job(&job_id),
            self.gateway.get_all_for_job(&job_id, None, None)
        );
        self.loads_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.update(|s| {
            if !self.is_current(generation) {
                debug!(%job_id, "discarding superseded load");
                return;
            }
            s.is_loading = false;
            match (job, page) {
                (Err(e), _) => {
                    warn!(%job_id, error = %e, "job fetch failed");
                    s.error = Some(DisplayError::new(
                        ErrorKind::Load,
                        format!("Job {} not found", job_id),
                    ));
                }
                (Ok(_), Err(e)) => {
                    warn!(%job_id, error = %e, "candidate fetch failed");
                    s.error = Some(DisplayError::new(
                        ErrorKind::Load,
                        format!("Candidates for job {} can't be retrieve", job_id),
                    ));
                }
                (Ok(job), Ok(page)) => {
                    info!(%job_id, candidates = page.candidates.len(), "board loaded");
                    s.job = Some(job);
                    s.candidates = page.candidates;
                    s.column_counts = page.columns.unwrap_or_default();
                }
            }
        });
        Ok(())
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Move a candidate to `new_status` at `target_index` of that column.
    ///
    /// The move is applied locally before the server is asked. If the server
    /// refuses, the candidate is restored exactly as it was and a recoverable
    /// error is shown.
    pub async fn update_candidate_status(
        &self,
        candidate_id: i64,
        new_status: CandidateStatus,
        target_index: usize,
    ) -> Result<MoveOutcome, BoardError> {
        let generation = self.load_generation.load(Ordering::SeqCst);
        let (job_id, actor, before, change) = {
            let mut state = self.lock();
            let job_id = state
                .loaded_job_id()
                .ok_or(BoardError::JobIdRequired)?
                .to_string();
            let actor = state.session.clone().ok_or(BoardError::SessionRequired)?;
            let before = state
                .find(candidate_id)
                .cloned()
                .ok_or(BoardError::CandidateNotFound { id: candidate_id })?;

            let destination = columns::ordered_column(&state.candidates, new_status);
            let same_slot = destination
                .get(target_index)
                .is_some_and(|c| c.id == candidate_id);
            if same_slot && before.has_status(new_status) {
                debug!(candidate_id, "drop onto own slot, nothing to do");
                return Ok(MoveOutcome::Unchanged);
            }

            let siblings: Vec<f64> = destination.iter().map(|c| c.position).collect();
            let change = CandidateUpdate {
                status: new_status,
                position: position::allocate(target_index, &siblings),
                prior_updated_at: before.updated_at,
            };

            state.clear_recoverable_error();
            if let Some(candidate) = state.find_mut(candidate_id) {
                candidate.status = new_status.as_str().to_string();
                candidate.position = change.position;
                candidate.updated_at = Utc::now();
            }
            (job_id, actor, before, change)
        };
        self.publish();

        debug!(
            candidate_id,
            status = %change.status,
            position = change.position,
            "moving candidate"
        );
        let result = self
            .gateway
            .update_candidate(&job_id, candidate_id, &change, &actor)
            .await;

        Ok(self.update(|s| match result {
            _ if !self.is_current(generation) => {
                debug!(candidate_id, "board reloaded during move, dropping reply");
                MoveOutcome::Superseded
            }
            Ok(echoed) => {
                if let Some(candidate) = s.find_mut(candidate_id)
                    && candidate.has_status(change.status)
                    && candidate.position == change.position
                {
                    candidate.updated_at = echoed.updated_at;
                }
                MoveOutcome::Committed
            }
            Err(e) => {
                warn!(candidate_id, error = %e, "status change rejected, rolling back");
                if let Some(candidate) = s.find_mut(candidate_id) {
                    *candidate = before;
                }
                s.error = Some(DisplayError::new(
                    ErrorKind::Recoverable,
                    STATUS_CHANGE_FAILED,
                ));
                MoveOutcome::RolledBack
            }
        }))
    }

    /// Fetch the next page of `status` after `last_position` and append it.
    pub async fn load_more_items_on_columns(
        &self,
        status: CandidateStatus,
        last_position: f64,
    ) -> Result<(), BoardError> {
        let generation = self.load_generation.load(Ordering::SeqCst);
        let job_id = self
            .lock()
            .loaded_job_id()
            .map(str::to_string)
            .ok_or(BoardError::JobIdRequired)?;

        debug!(%job_id, %status, last_position, "loading next page");
        let result = self
            .gateway
            .get_all_for_job(&job_id, Some(status), Some(last_position))
            .await;

        self.update(|s| match result {
            _ if !self.is_current(generation) => {
                debug!(%job_id, %status, "board reloaded during page fetch, dropping page");
            }
            Ok(page) => {
                for candidate in page.candidates {
                    if s.find(candidate.id).is_none() {
                        s.candidates.push(candidate);
                    }
                }
            }
            Err(e) => {
                warn!(%job_id, %status, error = %e, "next page fetch failed");
                s.error = Some(DisplayError::new(ErrorKind::Recoverable, NEXT_PAGE_FAILED));
            }
        });
        Ok(())
    }

    /// Put a server-confirmed new candidate on the board as-is.
    pub fn add_candidate(&self, candidate: Candidate) {
        self.update(|s| match s.find_mut(candidate.id) {
            Some(existing) => *existing = candidate,
            None => s.candidates.push(candidate),
        });
    }

    /// Fold one event pushed for `job_id` into the board. Failed events, and
    /// events for a job the board no longer shows, leave no trace.
    pub fn apply_remote_event(
        &self,
        job_id: &str,
        event: &CandidateEvent,
    ) -> Result<Reconciliation, BoardError> {
        let mut state = self.lock();
        if state.job_id.as_deref() != Some(job_id) {
            debug!(%job_id, candidate_id = event.candidate.id, "event for another job");
            return Ok(Reconciliation::OtherJob);
        }
        let outcome = reconcile::reconcile(&mut state, event)?;
        drop(state);
        self.publish();
        Ok(outcome)
    }

    /// Record the live channel status reported for `job_id`. Ignored once the
    /// board has moved on to another job.
    pub fn set_connection_state(&self, job_id: &str, connection: ChannelState) {
        let mut state = self.lock();
        if state.job_id.as_deref() != Some(job_id) {
            debug!(%job_id, %connection, "status from a channel for another job");
            return;
        }
        state.connection = connection;
        if connection == ChannelState::Exhausted {
            state.error = Some(DisplayError::new(ErrorKind::Connection, CONNECTION_EXHAUSTED));
        }
        drop(state);
        self.publish();
    }

    /// Clear a recoverable error. Load and connection errors stay.
    pub fn dismiss_error(&self) {
        self.update(BoardState::clear_recoverable_error);
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn state(&self) -> BoardState {
        self.lock().clone()
    }

    pub fn columns(&self) -> Result<[Column; 4], BoardError> {
        let state = self.lock();
        columns::project(&state.candidates, &state.column_counts)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let state = self.lock();
        BoardSnapshot {
            is_loading: state.is_loading,
            error: state.error.as_ref().map(|e| e.message.clone()),
            job_name: state.job_name().to_string(),
            columns: columns::project(&state.candidates, &state.column_counts),
            connection: state.connection,
            session: state.session.clone(),
        }
    }

    /// Revision counter bumped on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Job id the board follows, updated when a load switches jobs.
    pub fn watch_job(&self) -> watch::Receiver<Option<String>> {
        self.job_watch.subscribe()
    }

    /// Job and identity the live channel should follow, once both exist.
    pub fn live_target(&self) -> Option<(String, SessionUser)> {
        let state = self.lock();
        let job_id = state.job_id.clone()?;
        let session = state.session.clone()?;
        Some((job_id, session))
    }

    /// Whether board gestures should be accepted.
    pub fn is_interactive(&self) -> bool {
        let state = self.lock();
        state.session.is_some() && state.loaded_job_id().is_some()
    }
}
