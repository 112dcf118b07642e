//! Work units - immutable, independently solvable fragments of the search.

use crate::board::{Board, Move};
use crate::ids::UnitId;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// An immutable description of a partitioned search task.
///
/// A unit carries a board, the move history that produced it from the
/// root, and a budget bounding how much further it may be expanded. Units
/// are safe to re-run: solving one has no side effects, so at-least-once
/// redelivery after a worker crash is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Unique unit identifier.
    pub id: UnitId,

    /// Unit this one was expanded from, if any.
    pub parent_id: Option<UnitId>,

    /// Board state at this fragment's root.
    pub board: Board,

    /// Moves from the original board to `board`.
    pub path: Vec<Move>,

    /// Remaining expansion budget, decremented per search ply.
    pub remaining_budget: u32,
}

impl WorkUnit {
    /// Create a root unit with no parent.
    pub fn root(board: Board, remaining_budget: u32) -> Self {
        Self {
            id: UnitId::generate(),
            parent_id: None,
            board,
            path: Vec::new(),
            remaining_budget,
        }
    }

    /// Create a child unit expanded from `parent`.
    pub fn child(parent: &WorkUnit, board: Board, path: Vec<Move>, remaining_budget: u32) -> Self {
        Self {
            id: UnitId::generate(),
            parent_id: Some(parent.id.clone()),
            board,
            path,
            remaining_budget,
        }
    }
}

/// Partition a board into at least `fanout` work units.
///
/// Breadth-first frontier expansion from `board`, deduplicating states,
/// until the frontier holds `fanout` distinct boards (or the reachable
/// space is smaller). The returned order is deterministic for a given
/// board and fanout, so re-runs assign the same units in the same order.
pub fn split(board: &Board, fanout: usize, unit_budget: u32) -> Vec<WorkUnit> {
    if fanout <= 1 {
        return vec![WorkUnit::root(board.clone(), unit_budget)];
    }

    let mut seen: HashSet<Board> = HashSet::new();
    seen.insert(board.clone());

    let mut frontier: VecDeque<(Board, Vec<Move>)> = VecDeque::new();
    frontier.push_back((board.clone(), Vec::new()));

    while frontier.len() < fanout {
        // A board already at the goal must stay in the frontier untouched
        // so the unit that contains it reports Solved.
        if frontier.iter().any(|(b, _)| b.is_goal()) {
            break;
        }

        let mut next: VecDeque<(Board, Vec<Move>)> = VecDeque::new();
        for (b, path) in &frontier {
            for (mv, nb) in b.neighbors() {
                if seen.insert(nb.clone()) {
                    let mut child_path = path.clone();
                    child_path.push(mv);
                    next.push_back((nb, child_path));
                }
            }
        }

        if next.is_empty() {
            // Reachable space exhausted before hitting the fanout.
            break;
        }
        frontier = next;
    }

    frontier
        .into_iter()
        .map(|(b, path)| WorkUnit {
            id: UnitId::generate(),
            parent_id: None,
            board: b,
            path,
            remaining_budget: unit_budget,
        })
        .collect()
}
