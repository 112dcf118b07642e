//! Presentation events emitted by the coordinator.
//!
//! Delivery is fire-and-forget over a broadcast channel: a slow or absent
//! renderer never blocks merging, and raw transport errors never surface
//! here.

use serde::Serialize;
use tilesolve_core::Move;

/// Events consumable by any renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchEvent {
    /// Queue depth changed.
    Progress {
        units_pending: usize,
        units_in_flight: usize,
    },

    /// A solution path was merged; the search is over.
    Solved { path: Vec<Move> },

    /// The search space was exhausted without a solution.
    Exhausted,
}
