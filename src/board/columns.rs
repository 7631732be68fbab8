//! Projection of the flat candidate set into the four board columns.

use serde::Serialize;

use super::models::{Candidate, CandidateStatus, ColumnCounts};
use crate::errors::BoardError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Column {
    pub id: CandidateStatus,
    pub name: String,
    /// Server-reported total, not the number of loaded cards.
    pub candidates_count: u64,
    pub candidates: Vec<Candidate>,
    pub has_more_candidates: bool,
    /// Highest loaded position, 0 when nothing is loaded. Seeds the next page request.
    pub last_position: f64,
}

/// Partition `candidates` into the fixed column order new, interview, hired, rejected.
///
/// Fails on the first candidate whose status is not one of the four known
/// values. Within a column cards are ordered by position; equal positions
/// keep their insertion order.
pub fn project(candidates: &[Candidate], counts: &ColumnCounts) -> Result<[Column; 4], BoardError> {
    let mut buckets: [Vec<Candidate>; 4] = Default::default();
    for candidate in candidates {
        let status = candidate.status()?;
        buckets[column_index(status)].push(candidate.clone());
    }

    Ok(CandidateStatus::ALL.map(|status| {
        let mut cards = std::mem::take(&mut buckets[column_index(status)]);
        cards.sort_by(|a, b| a.position.total_cmp(&b.position));

        let candidates_count = counts.get(status.as_str()).copied().unwrap_or(0);
        let last_position = cards.last().map(|c| c.position).unwrap_or(0.0);
        Column {
            id: status,
            name: status.display_name().to_string(),
            candidates_count,
            has_more_candidates: candidates_count > cards.len() as u64,
            last_position,
            candidates: cards,
        }
    }))
}

/// Loaded cards with `status`, in board order.
pub fn ordered_column(candidates: &[Candidate], status: CandidateStatus) -> Vec<&Candidate> {
    let mut cards: Vec<&Candidate> = candidates.iter().filter(|c| c.has_status(status)).collect();
    cards.sort_by(|a, b| a.position.total_cmp(&b.position));
    cards
}

fn column_index(status: CandidateStatus) -> usize {
    match status {
        CandidateStatus::New => 0,
        CandidateStatus::Interview => 1,
        CandidateStatus::Hired => 2,
        CandidateStatus::Rejected => 3,
    }
}
