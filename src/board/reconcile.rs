//! Folding pushed collaborator events into the board state.
//!
//! `reconcile` is a pure reducer: it validates the event before touching
//! anything, so an event either applies completely or not at all.

use super::events::{CandidateEvent, EventKind};
use super::models::{Candidate, CandidateStatus};
use super::store::BoardState;
use crate::errors::BoardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Our own change echoed back; only the counts were refreshed.
    OwnEvent,
    /// Lands beyond what has been paged into view.
    Suppressed,
    Inserted,
    Updated,
    /// `add` for a candidate that is already on the board.
    AlreadyLoaded,
    /// Sent for a job the board no longer shows; set by the store, not the reducer.
    OtherJob,
}

pub fn reconcile(
    state: &mut BoardState,
    event: &CandidateEvent,
) -> Result<Reconciliation, BoardError> {
    let status = event.candidate.status()?;

    if let Some(columns) = &event.columns {
        state.column_counts = columns.clone();
    }

    if state
        .session
        .as_ref()
        .is_some_and(|me| me.is_same_actor(&event.user))
    {
        return Ok(Reconciliation::OwnEvent);
    }

    if !is_visible(&state.candidates, status, event.candidate.position) {
        return Ok(Reconciliation::Suppressed);
    }

    let existing = state
        .candidates
        .iter_mut()
        .find(|c| c.id == event.candidate.id);
    Ok(match (event.kind, existing) {
        (EventKind::Add, Some(_)) => Reconciliation::AlreadyLoaded,
        (EventKind::Update, Some(candidate)) => {
            *candidate = event.candidate.clone();
            Reconciliation::Updated
        }
        (_, None) => {
            state.candidates.push(event.candidate.clone());
            Reconciliation::Inserted
        }
    })
}

/// A position is visible when the column has nothing loaded yet, or when it
/// does not exceed the column's highest loaded position.
pub fn is_visible(candidates: &[Candidate], status: CandidateStatus, position: f64) -> bool {
    candidates
        .iter()
        .filter(|c| c.has_status(status))
        .map(|c| c.position)
        .max_by(f64::total_cmp)
        .is_none_or(|watermark| position <= watermark)
}
