//! Global search state and worker membership records.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tilesolve_core::{Move, UnitId, WorkUnit, WorkerId};

/// Lifecycle of a registered worker handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    /// Registered, no heartbeat or work request seen yet.
    Joining,
    /// Ready for an assignment.
    Idle,
    /// Holds exactly one in-flight unit.
    Busy,
    /// Missed the heartbeat timeout; its unit has been reclaimed.
    Unreachable,
    /// Dropped from membership; must re-register to come back.
    Left,
}

impl WorkerState {
    /// True if the worker may be handed a unit.
    pub fn can_accept_work(&self) -> bool {
        matches!(self, Self::Joining | Self::Idle)
    }
}

/// Membership record for one worker.
#[derive(Debug)]
pub struct WorkerEntry {
    /// Transport-specific locator.
    pub address: String,

    /// Current lifecycle state.
    pub state: WorkerState,

    /// Timestamp of the last heartbeat or request.
    pub last_heartbeat: DateTime<Utc>,

    /// Consecutive overdue sweeps.
    pub strikes: u32,

    /// Registration order, kept for deterministic reporting.
    pub joined: u64,
}

/// A unit currently assigned to a worker.
#[derive(Debug)]
pub struct InFlight {
    pub unit: WorkUnit,
    pub worker_id: WorkerId,
}

/// The single shared resource of the system.
///
/// Every unit ever created is in exactly one of `pending`, `in_flight`,
/// or the merged tally; `terminated` flips to true exactly once and never
/// reverts.
#[derive(Debug, Default)]
pub struct GlobalSearchState {
    /// Units awaiting assignment, FIFO by arrival.
    pub pending: VecDeque<WorkUnit>,

    /// Units currently held by workers.
    pub in_flight: HashMap<UnitId, InFlight>,

    /// Units merged and logically discarded.
    pub merged: u64,

    /// Units ever created (initial split plus expansions).
    pub created: u64,

    /// The solution path, once one is merged.
    pub solution: Option<Vec<Move>>,

    /// Set exactly once; afterwards all outcomes are accepted but ignored.
    pub terminated: bool,
}

impl GlobalSearchState {
    /// Unit conservation: no unit is ever silently dropped.
    pub fn is_conserved(&self) -> bool {
        self.pending.len() as u64 + self.in_flight.len() as u64 + self.merged == self.created
    }
}

/// Point-in-time view of the coordinator for CLIs and monitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub units_pending: usize,
    pub units_in_flight: usize,
    pub units_merged: u64,
    pub units_created: u64,
    pub terminated: bool,
    pub solution: Option<Vec<Move>>,
    pub workers: Vec<WorkerSnapshot>,
}

/// Point-in-time view of one worker handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub worker_id: String,
    pub address: String,
    pub state: WorkerState,
    pub last_heartbeat: DateTime<Utc>,
    pub strikes: u32,
}
