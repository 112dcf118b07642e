//! Local solver - the pluggable single-process search procedure.
//!
//! A solver consumes one work unit and yields exactly one [`Outcome`]. It
//! must be a pure function of the unit so at-least-once redelivery is safe.

use crate::board::{Board, Move};
use crate::outcome::Outcome;
use crate::unit::WorkUnit;
use std::collections::HashSet;

/// Pluggable local search procedure.
pub trait Solver: Send + Sync {
    /// Expand one unit into an outcome, within the unit's remaining budget.
    fn expand(&self, unit: &WorkUnit) -> Outcome;
}

/// Tuning for [`DepthBoundedSolver`].
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Search depth per expansion before handing the frontier back as
    /// child units.
    pub horizon: u32,

    /// Hard cap on visited nodes per expansion. Tripping it is treated as
    /// exhaustion, so a single unit can never diverge.
    pub node_cap: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            horizon: 10,
            node_cap: 2_000_000,
        }
    }
}

/// Depth-bounded depth-first search with Manhattan-ordered moves.
///
/// Searches `horizon` plies deep (never past the unit's remaining budget).
/// Finding the goal yields `Solved` with the full path from the original
/// board. Otherwise the deduplicated depth-`horizon` frontier becomes
/// `Expanded` children with the budget decremented by the plies consumed;
/// a consumed budget or an empty frontier yields `Exhausted`.
pub struct DepthBoundedSolver {
    config: SolverConfig,
}

impl DepthBoundedSolver {
    /// Create a solver with explicit tuning.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl Default for DepthBoundedSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

struct Search {
    horizon: u32,
    node_cap: u64,
    nodes: u64,
    frontier: Vec<(Board, Vec<Move>)>,
    frontier_seen: HashSet<Board>,
    solution: Option<Vec<Move>>,
}

impl Search {
    /// Returns false when the node cap has been tripped.
    fn dfs(&mut self, board: &Board, depth: u32, last: Option<Move>, path: &mut Vec<Move>) -> bool {
        self.nodes += 1;
        if self.nodes > self.node_cap {
            return false;
        }

        if board.is_goal() {
            if self.solution.is_none() {
                self.solution = Some(path.clone());
            }
            return true;
        }

        if depth == self.horizon {
            if self.frontier_seen.insert(board.clone()) {
                self.frontier.push((board.clone(), path.clone()));
            }
            return true;
        }

        // Cheapest-looking successors first; ties keep declaration order.
        let mut successors = board.neighbors();
        successors.retain(|(m, _)| Some(m.inverse()) != last);
        successors.sort_by_key(|(_, b)| b.manhattan());

        for (mv, next) in successors {
            path.push(mv);
            let ok = self.dfs(&next, depth + 1, Some(mv), path);
            path.pop();
            if !ok || self.solution.is_some() {
                return ok;
            }
        }
        true
    }
}

impl Solver for DepthBoundedSolver {
    fn expand(&self, unit: &WorkUnit) -> Outcome {
        if unit.board.is_goal() {
            return Outcome::Solved {
                path: unit.path.clone(),
            };
        }
        if unit.remaining_budget == 0 {
            return Outcome::Exhausted;
        }

        let horizon = self.config.horizon.min(unit.remaining_budget);
        let mut search = Search {
            horizon,
            node_cap: self.config.node_cap,
            nodes: 0,
            frontier: Vec::new(),
            frontier_seen: HashSet::new(),
            solution: None,
        };

        let mut path = Vec::new();
        let within_cap = search.dfs(&unit.board, 0, unit.path.last().copied(), &mut path);

        if let Some(local) = search.solution {
            let mut full = unit.path.clone();
            full.extend(local);
            return Outcome::Solved { path: full };
        }

        // Divergence guard: a capped search is treated as exhausted rather
        // than left running.
        if !within_cap {
            return Outcome::Exhausted;
        }

        if unit.remaining_budget <= horizon || search.frontier.is_empty() {
            return Outcome::Exhausted;
        }

        let remaining = unit.remaining_budget - horizon;
        let children = search
            .frontier
            .into_iter()
            .map(|(board, local)| {
                let mut full = unit.path.clone();
                full.extend(local);
                WorkUnit::child(unit, board, full, remaining)
            })
            .collect();

        Outcome::Expanded { children }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replay(root: &Board, path: &[Move]) -> Board {
        let mut b = root.clone();
        for &mv in path {
            b = b.apply(mv).expect("replayable path");
        }
        b
    }

    #[test]
    fn test_solves_shallow_scramble() {
        let root = Board::scrambled(3, 6, 11).unwrap();
        let unit = WorkUnit::root(root.clone(), 20);
        let solver = DepthBoundedSolver::default();

        match solver.expand(&unit) {
            Outcome::Solved { path } => {
                assert!(replay(&root, &path).is_goal());
            }
            other => panic!("expected Solved, got {:?}", other),
        }
    }

    #[test]
    fn test_already_solved_unit() {
        let unit = WorkUnit::root(Board::goal(4).unwrap(), 5);
        let outcome = DepthBoundedSolver::default().expand(&unit);
        assert_eq!(outcome, Outcome::Solved { path: vec![] });
    }

    #[test]
    fn test_zero_budget_exhausts() {
        let unit = WorkUnit::root(Board::scrambled(3, 20, 2).unwrap(), 0);
        let outcome = DepthBoundedSolver::default().expand(&unit);
        assert_eq!(outcome, Outcome::Exhausted);
    }

    #[test]
    fn test_deep_scramble_expands_with_decremented_budget() {
        let solver = DepthBoundedSolver::new(SolverConfig {
            horizon: 4,
            node_cap: 2_000_000,
        });
        let root = Board::scrambled(4, 60, 5).unwrap();
        let unit = WorkUnit::root(root.clone(), 40);

        match solver.expand(&unit) {
            Outcome::Expanded { children } => {
                assert!(!children.is_empty());
                for child in &children {
                    assert_eq!(child.remaining_budget, 36);
                    assert_eq!(child.parent_id.as_ref(), Some(&unit.id));
                    assert_eq!(replay(&root, &child.path), child.board);
                }
            }
            Outcome::Solved { path } => {
                // A lucky scramble may still solve within the horizon.
                assert!(replay(&root, &path).is_goal());
            }
            Outcome::Exhausted => panic!("budget should not be exhausted"),
        }
    }

    #[test]
    fn test_budget_at_most_horizon_exhausts_instead_of_expanding() {
        let solver = DepthBoundedSolver::new(SolverConfig {
            horizon: 10,
            node_cap: 2_000_000,
        });
        // Far enough from the goal that 3 plies cannot solve it.
        let root = Board::scrambled(4, 80, 9).unwrap();
        let unit = WorkUnit::root(root, 3);
        assert_eq!(solver.expand(&unit), Outcome::Exhausted);
    }

    #[test]
    fn test_node_cap_maps_divergence_to_exhausted() {
        let solver = DepthBoundedSolver::new(SolverConfig {
            horizon: 10,
            node_cap: 5,
        });
        let unit = WorkUnit::root(Board::scrambled(4, 80, 13).unwrap(), 40);
        assert_eq!(solver.expand(&unit), Outcome::Exhausted);
    }

    #[test]
    fn test_expand_is_deterministic() {
        let solver = DepthBoundedSolver::new(SolverConfig {
            horizon: 5,
            node_cap: 2_000_000,
        });
        let unit = WorkUnit::root(Board::scrambled(4, 50, 21).unwrap(), 30);
        let a = solver.expand(&unit);
        let b = solver.expand(&unit);
        match (a, b) {
            (Outcome::Expanded { children: ca }, Outcome::Expanded { children: cb }) => {
                let boards_a: Vec<&Board> = ca.iter().map(|u| &u.board).collect();
                let boards_b: Vec<&Board> = cb.iter().map(|u| &u.board).collect();
                assert_eq!(boards_a, boards_b);
            }
            (a, b) => assert_eq!(a, b),
        }
    }
}
