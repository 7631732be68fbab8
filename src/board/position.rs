//! Fractional ordering keys for drag-and-drop inserts.
//!
//! Positions are floats so a card can always be dropped between two
//! neighbours without renumbering the column. Repeated midpoint inserts
//! into the same gap halve it every time and will eventually run out of
//! float precision; no rebalancing pass exists yet.

/// Position given to the first card of an empty column.
pub const BASELINE_POSITION: f64 = 1000.0;

/// Gap left after the last card when appending.
pub const APPEND_GAP: f64 = 1000.0;

/// Compute the position for an item dropped at `target_index` among
/// `siblings`, which must already be sorted ascending.
///
/// - empty column: [`BASELINE_POSITION`]
/// - head insert: halfway between 0 and the first sibling
/// - append (`target_index >= len`): last position + [`APPEND_GAP`]
/// - otherwise: midpoint of the two neighbours
pub fn allocate(target_index: usize, siblings: &[f64]) -> f64 {
    let Some(&last) = siblings.last() else {
        return BASELINE_POSITION;
    };

    if target_index >= siblings.len() {
        return last + APPEND_GAP;
    }

    let predecessor = match target_index {
        0 => 0.0,
        i => siblings[i - 1],
    };
    let successor = siblings[target_index];
    predecessor + (successor - predecessor) / 2.0
}
