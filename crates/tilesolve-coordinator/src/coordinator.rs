//! The coordinator protocol: membership, dispatch, merge, termination.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use tilesolve_core::{
    split, Board, Outcome, OutcomeReport, Register, RemoteError, WorkReply, WorkUnit, WorkerId,
};

use crate::config::CoordinatorConfig;
use crate::events::SearchEvent;
use crate::state::{
    GlobalSearchState, InFlight, StatusSnapshot, WorkerEntry, WorkerSnapshot, WorkerState,
};

/// Coordinator protocol errors.
///
/// None of these are fatal to the search; transports hand them back to
/// the worker, which logs and either retries, re-registers, or drains.
#[derive(Debug, Error, PartialEq)]
pub enum CoordinatorError {
    /// The search already terminated.
    #[error("search already terminated")]
    Terminated,

    /// The worker is not a current member.
    #[error("unknown worker: {0}")]
    UnknownWorker(WorkerId),

    /// Outcome reported for a unit the worker does not hold.
    #[error("unit {unit_id} is not assigned to worker {worker_id}")]
    UnknownAssignment { worker_id: WorkerId, unit_id: String },
}

impl CoordinatorError {
    /// The serializable form carried over the wire.
    pub fn to_remote(&self) -> RemoteError {
        match self {
            Self::Terminated => RemoteError::Terminated,
            Self::UnknownWorker(id) => RemoteError::UnknownWorker(id.to_string()),
            Self::UnknownAssignment { worker_id, unit_id } => RemoteError::UnknownAssignment {
                worker_id: worker_id.to_string(),
                unit_id: unit_id.clone(),
            },
        }
    }
}

struct Inner {
    search: GlobalSearchState,
    workers: HashMap<WorkerId, WorkerEntry>,
    next_join: u64,
}

/// Single source of truth for the distributed search.
///
/// All state transitions happen under one lock, in the order requests are
/// taken; merge order relative to correctness is commutative because only
/// one `Solved` is ever accepted and everything after termination is a
/// no-op.
pub struct Coordinator {
    config: CoordinatorConfig,
    inner: RwLock<Inner>,
    events: broadcast::Sender<SearchEvent>,
}

impl Coordinator {
    /// Create a coordinator with the given configuration.
    pub fn new(config: CoordinatorConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            inner: RwLock::new(Inner {
                search: GlobalSearchState::default(),
                workers: HashMap::new(),
                next_join: 0,
            }),
            events,
        }
    }

    /// Subscribe to presentation events.
    pub fn subscribe(&self) -> broadcast::Receiver<SearchEvent> {
        self.events.subscribe()
    }

    /// The configuration this coordinator runs with.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn emit(&self, event: SearchEvent) {
        // Fire-and-forget: nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn emit_progress(&self, search: &GlobalSearchState) {
        self.emit(SearchEvent::Progress {
            units_pending: search.pending.len(),
            units_in_flight: search.in_flight.len(),
        });
    }

    /// Split the initial board and enqueue the resulting units.
    ///
    /// A board that is already the goal terminates immediately with the
    /// empty path. Returns the number of units enqueued.
    pub async fn seed(&self, board: &Board) -> usize {
        if board.is_goal() {
            let mut inner = self.inner.write().await;
            if !inner.search.terminated {
                inner.search.terminated = true;
                inner.search.solution = Some(Vec::new());
                info!("Initial board is already solved");
                self.emit(SearchEvent::Solved { path: Vec::new() });
            }
            return 0;
        }
        if !board.is_solvable() {
            warn!("Initial board is not solvable; the search will exhaust");
        }

        let units = split(board, self.config.fanout, self.config.unit_budget);
        self.seed_units(units).await
    }

    /// Enqueue pre-built root units.
    pub async fn seed_units(&self, units: Vec<WorkUnit>) -> usize {
        let mut inner = self.inner.write().await;
        let count = units.len();
        inner.search.created += count as u64;
        inner.search.pending.extend(units);
        info!(units = count, "Seeded search queue");
        self.emit_progress(&inner.search);
        count
    }

    /// Register a worker. Rejected once the search has terminated;
    /// re-registration after `Left` is a fresh join.
    pub async fn register_worker(&self, msg: Register) -> Result<(), CoordinatorError> {
        let mut inner = self.inner.write().await;
        if inner.search.terminated {
            return Err(CoordinatorError::Terminated);
        }

        let joined = inner.next_join;
        inner.next_join += 1;
        let previous = inner.workers.insert(
            msg.worker_id.clone(),
            WorkerEntry {
                address: msg.address.clone(),
                state: WorkerState::Joining,
                last_heartbeat: Utc::now(),
                strikes: 0,
                joined,
            },
        );

        info!(
            worker_id = %msg.worker_id,
            address = %msg.address,
            rejoin = previous.is_some(),
            "Worker registered"
        );
        Ok(())
    }

    /// Hand out the next pending unit, FIFO by arrival.
    ///
    /// A worker that already holds a unit gets `NoWork` (never a second
    /// assignment); a terminated search answers `Drain`.
    pub async fn request_work(&self, worker_id: &WorkerId) -> Result<WorkReply, CoordinatorError> {
        let mut inner = self.inner.write().await;

        if inner.search.terminated {
            if let Some(entry) = inner.workers.get_mut(worker_id) {
                if entry.state != WorkerState::Left {
                    entry.state = WorkerState::Idle;
                }
            }
            return Ok(WorkReply::Drain);
        }

        let entry = match inner.workers.get_mut(worker_id) {
            Some(entry) if entry.state != WorkerState::Left => entry,
            _ => return Err(CoordinatorError::UnknownWorker(worker_id.clone())),
        };
        entry.last_heartbeat = Utc::now();
        entry.strikes = 0;

        if entry.state == WorkerState::Busy {
            warn!(worker_id = %worker_id, "Work request from a busy worker");
            return Ok(WorkReply::NoWork);
        }
        entry.state = WorkerState::Idle;

        let Some(unit) = inner.search.pending.pop_front() else {
            return Ok(WorkReply::NoWork);
        };

        info!(
            worker_id = %worker_id,
            unit_id = %unit.id,
            budget = unit.remaining_budget,
            "Assigning unit to worker"
        );
        if let Some(entry) = inner.workers.get_mut(worker_id) {
            entry.state = WorkerState::Busy;
        }
        inner.search.in_flight.insert(
            unit.id.clone(),
            InFlight {
                unit: unit.clone(),
                worker_id: worker_id.clone(),
            },
        );
        self.emit_progress(&inner.search);
        Ok(WorkReply::Assigned { unit })
    }

    /// Merge an outcome. The sole mutator of termination.
    ///
    /// After termination every report is accepted and ignored; a report
    /// for a unit the worker does not hold is `UnknownAssignment` (late
    /// redelivery race) and is discarded without effect.
    pub async fn submit_outcome(&self, report: OutcomeReport) -> Result<(), CoordinatorError> {
        let mut inner = self.inner.write().await;

        if inner.search.terminated {
            debug!(
                worker_id = %report.worker_id,
                unit_id = %report.unit_id,
                "Outcome after termination ignored"
            );
            if let Some(entry) = inner.workers.get_mut(&report.worker_id) {
                if entry.state == WorkerState::Busy {
                    entry.state = WorkerState::Idle;
                }
            }
            return Ok(());
        }

        match inner.search.in_flight.get(&report.unit_id) {
            Some(in_flight) if in_flight.worker_id == report.worker_id => {}
            _ => {
                warn!(
                    worker_id = %report.worker_id,
                    unit_id = %report.unit_id,
                    "Outcome for a unit this worker does not hold; discarded"
                );
                return Err(CoordinatorError::UnknownAssignment {
                    worker_id: report.worker_id.clone(),
                    unit_id: report.unit_id.to_string(),
                });
            }
        }

        inner.search.in_flight.remove(&report.unit_id);
        inner.search.merged += 1;
        if let Some(entry) = inner.workers.get_mut(&report.worker_id) {
            entry.state = WorkerState::Idle;
            entry.last_heartbeat = Utc::now();
            entry.strikes = 0;
        }

        match report.outcome {
            Outcome::Solved { path } => {
                info!(
                    worker_id = %report.worker_id,
                    unit_id = %report.unit_id,
                    moves = path.len(),
                    "Solution merged; search terminated"
                );
                // Everything still queued or in flight is moot.
                let moot =
                    inner.search.pending.len() as u64 + inner.search.in_flight.len() as u64;
                inner.search.merged += moot;
                inner.search.pending.clear();
                inner.search.in_flight.clear();
                inner.search.solution = Some(path.clone());
                inner.search.terminated = true;
                self.emit(SearchEvent::Solved { path });
                return Ok(());
            }
            Outcome::Expanded { children } => {
                debug!(
                    unit_id = %report.unit_id,
                    children = children.len(),
                    "Unit expanded"
                );
                inner.search.created += children.len() as u64;
                inner.search.pending.extend(children);
            }
            Outcome::Exhausted => {
                debug!(unit_id = %report.unit_id, "Unit exhausted");
            }
        }

        // An expansion with no children can empty the search just like an
        // exhaustion, so the termination check covers both.
        if inner.search.pending.is_empty() && inner.search.in_flight.is_empty() {
            info!("All units exhausted; search terminated without a solution");
            inner.search.terminated = true;
            self.emit(SearchEvent::Exhausted);
        } else {
            self.emit_progress(&inner.search);
        }
        Ok(())
    }

    /// Record a heartbeat. Revives `Unreachable` workers; the ack carries
    /// the termination flag so workers learn of a drain.
    pub async fn heartbeat(&self, worker_id: &WorkerId) -> Result<bool, CoordinatorError> {
        let mut inner = self.inner.write().await;
        let terminated = inner.search.terminated;

        let entry = match inner.workers.get_mut(worker_id) {
            Some(entry) if entry.state != WorkerState::Left => entry,
            _ => return Err(CoordinatorError::UnknownWorker(worker_id.clone())),
        };
        entry.last_heartbeat = Utc::now();
        entry.strikes = 0;
        if matches!(entry.state, WorkerState::Joining | WorkerState::Unreachable) {
            entry.state = WorkerState::Idle;
        }
        Ok(terminated)
    }

    /// Explicit departure. Any held unit returns to the pending queue.
    pub async fn leave(&self, worker_id: &WorkerId) -> Result<(), CoordinatorError> {
        let mut inner = self.inner.write().await;
        match inner.workers.get_mut(worker_id) {
            Some(entry) => entry.state = WorkerState::Left,
            None => {
                warn!(worker_id = %worker_id, "Leave from unknown worker");
                return Ok(());
            }
        }
        let requeued = requeue_worker_units(&mut inner.search, worker_id);
        info!(worker_id = %worker_id, requeued, "Worker left");
        if requeued > 0 {
            self.emit_progress(&inner.search);
        }
        Ok(())
    }

    /// One liveness sweep at `now`. Returns true once the search has
    /// terminated and the sweeper can stop.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> bool {
        let timeout = chrono::Duration::seconds(self.config.heartbeat_timeout_secs as i64);
        let max_strikes = self.config.max_strikes;
        let mut inner = self.inner.write().await;

        let overdue: Vec<WorkerId> = inner
            .workers
            .iter()
            .filter(|(_, e)| e.state != WorkerState::Left)
            .filter(|(_, e)| now.signed_duration_since(e.last_heartbeat) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for worker_id in overdue {
            let Some(entry) = inner.workers.get_mut(&worker_id) else {
                continue;
            };
            entry.strikes += 1;
            let strikes = entry.strikes;

            if entry.state != WorkerState::Unreachable {
                entry.state = WorkerState::Unreachable;
                let requeued = requeue_worker_units(&mut inner.search, &worker_id);
                warn!(
                    worker_id = %worker_id,
                    requeued,
                    "Worker unreachable; reclaimed its work"
                );
                if requeued > 0 {
                    self.emit_progress(&inner.search);
                }
            }

            if strikes > max_strikes {
                if let Some(entry) = inner.workers.get_mut(&worker_id) {
                    entry.state = WorkerState::Left;
                }
                warn!(worker_id = %worker_id, strikes, "Worker dropped after repeated failures");
            }
        }

        inner.search.terminated
    }

    /// Run the periodic liveness sweep until the search terminates.
    ///
    /// Runs on its own schedule and never blocks the dispatch path beyond
    /// the shared state lock.
    pub async fn run_sweeper(&self) {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.config.sweep_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.sweep_at(Utc::now()).await {
                return;
            }
        }
    }

    /// Point-in-time snapshot for CLIs and monitors.
    pub async fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.read().await;
        let mut workers: Vec<WorkerSnapshot> = inner
            .workers
            .iter()
            .map(|(id, e)| WorkerSnapshot {
                worker_id: id.to_string(),
                address: e.address.clone(),
                state: e.state,
                last_heartbeat: e.last_heartbeat,
                strikes: e.strikes,
            })
            .collect();
        workers.sort_by_key(|w| w.worker_id.clone());

        StatusSnapshot {
            units_pending: inner.search.pending.len(),
            units_in_flight: inner.search.in_flight.len(),
            units_merged: inner.search.merged,
            units_created: inner.search.created,
            terminated: inner.search.terminated,
            solution: inner.search.solution.clone(),
            workers,
        }
    }

    /// True once the search has terminated.
    pub async fn is_terminated(&self) -> bool {
        self.inner.read().await.search.terminated
    }

    /// The merged solution, if one was found.
    pub async fn solution(&self) -> Option<Vec<tilesolve_core::Move>> {
        self.inner.read().await.search.solution.clone()
    }

    #[cfg(test)]
    async fn assert_conserved(&self) {
        assert!(self.inner.read().await.search.is_conserved());
    }
}

/// Move every unit held by `worker_id` back to the pending queue.
fn requeue_worker_units(search: &mut GlobalSearchState, worker_id: &WorkerId) -> usize {
    let reclaimed: Vec<_> = search
        .in_flight
        .iter()
        .filter(|(_, f)| &f.worker_id == worker_id)
        .map(|(id, _)| id.clone())
        .collect();
    for unit_id in &reclaimed {
        if let Some(in_flight) = search.in_flight.remove(unit_id) {
            search.pending.push_back(in_flight.unit);
        }
    }
    reclaimed.len()
}
