//! Worker-reported outcomes for work units.

use crate::board::Move;
use crate::unit::WorkUnit;
use serde::{Deserialize, Serialize};

/// The result a worker reports for exactly one assigned work unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// A full path from the original board to the goal was found.
    Solved { path: Vec<Move> },

    /// The unit was expanded into child units for redistribution.
    Expanded { children: Vec<WorkUnit> },

    /// The unit's budget was consumed without finding the goal.
    Exhausted,
}

impl Outcome {
    /// Returns true for a `Solved` outcome.
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved { .. })
    }

    /// Number of child units this outcome introduces.
    pub fn child_count(&self) -> usize {
        match self {
            Self::Expanded { children } => children.len(),
            _ => 0,
        }
    }
}
