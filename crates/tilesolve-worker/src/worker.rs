//! Worker lifecycle: pull a unit, solve it, report the outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::task;
use tracing::{debug, info, warn};

use tilesolve_core::{
    Heartbeat, Leave, Outcome, OutcomeReport, Register, RemoteError, Solver, WorkRequest,
    WorkReply, WorkUnit,
};
use tilesolve_transport::{CoordinatorLink, TransportError};

use crate::config::WorkerConfig;

/// Worker failures that end the run loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The transport failed beyond the bounded retry budget.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A worker instance: processes exactly one unit at a time.
///
/// Parallelism comes from running many instances, locally or across
/// machines; each one is single-threaded with respect to its own
/// assignment.
pub struct Worker {
    config: WorkerConfig,
    link: Arc<dyn CoordinatorLink>,
    solver: Arc<dyn Solver>,
}

impl Worker {
    /// Create a worker against a coordinator link and a local solver.
    pub fn new(config: WorkerConfig, link: Arc<dyn CoordinatorLink>, solver: Arc<dyn Solver>) -> Self {
        Self {
            config,
            link,
            solver,
        }
    }

    /// Join the cluster and process units until the search drains.
    pub async fn run(self) -> Result<(), WorkerError> {
        let worker_id = self.config.worker_id.clone();
        info!(worker_id = %worker_id, "Worker starting");

        if !self.register().await? {
            // The search was already over before we joined.
            return Ok(());
        }

        let drained = Arc::new(AtomicBool::new(false));
        let heartbeat = tokio::spawn(run_heartbeat_loop(
            self.link.clone(),
            self.config.clone(),
            drained.clone(),
        ));

        let result = self.poll_loop(&drained).await;

        heartbeat.abort();
        if let Err(err) = self
            .link
            .leave(Leave {
                worker_id: worker_id.clone(),
            })
            .await
        {
            debug!(worker_id = %worker_id, error = %err, "Leave not delivered");
        }
        info!(worker_id = %worker_id, "Worker stopped");
        result
    }

    /// Register with bounded retries. Returns false when the search has
    /// already terminated.
    async fn register(&self) -> Result<bool, WorkerError> {
        let msg = Register {
            worker_id: self.config.worker_id.clone(),
            address: self.config.address.clone(),
        };

        let mut attempts = 0;
        loop {
            match self.link.register(msg.clone()).await {
                Ok(()) => return Ok(true),
                Err(TransportError::Remote(RemoteError::Terminated)) => return Ok(false),
                Err(err) if err.is_retryable() && attempts < self.config.send_retries => {
                    attempts += 1;
                    warn!(
                        worker_id = %self.config.worker_id,
                        attempt = attempts,
                        error = %err,
                        "Registration failed; retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn poll_loop(&self, drained: &AtomicBool) -> Result<(), WorkerError> {
        while !drained.load(Ordering::SeqCst) {
            let request = WorkRequest {
                worker_id: self.config.worker_id.clone(),
            };
            match self.link.request_work(request).await {
                Ok(WorkReply::Assigned { unit }) => {
                    if self.process(unit).await.is_err() {
                        // The coordinator still counts the unit as held by
                        // us; leaving requeues it and a fresh join clears
                        // the Busy state.
                        warn!(
                            worker_id = %self.config.worker_id,
                            "Rejoining to release an undeliverable unit"
                        );
                        let _ = self
                            .link
                            .leave(Leave {
                                worker_id: self.config.worker_id.clone(),
                            })
                            .await;
                        if !self.register().await? {
                            break;
                        }
                    }
                }
                Ok(WorkReply::NoWork) => {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Ok(WorkReply::Drain) => {
                    info!(worker_id = %self.config.worker_id, "Search drained");
                    break;
                }
                Err(TransportError::Remote(RemoteError::Terminated)) => break,
                Err(TransportError::Remote(RemoteError::UnknownWorker(_))) => {
                    // Dropped by the liveness sweep; a fresh join is the
                    // only way back in.
                    warn!(worker_id = %self.config.worker_id, "Membership lost; re-registering");
                    if !self.register().await? {
                        break;
                    }
                }
                Err(err) if err.is_retryable() => {
                    warn!(worker_id = %self.config.worker_id, error = %err, "Poll failed");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Busy: run the solver on its own blocking thread, then report.
    async fn process(&self, unit: WorkUnit) -> Result<(), TransportError> {
        let unit_id = unit.id.clone();
        debug!(
            worker_id = %self.config.worker_id,
            unit_id = %unit_id,
            budget = unit.remaining_budget,
            "Solving unit"
        );

        let solver = self.solver.clone();
        let outcome = task::spawn_blocking(move || solver.expand(&unit))
            .await
            .unwrap_or_else(|err| {
                // A panicking solver forfeits the unit; exhaustion is the
                // safe report since the unit can be re-split elsewhere.
                warn!(unit_id = %unit_id, error = %err, "Solver panicked");
                Outcome::Exhausted
            });

        self.report(OutcomeReport {
            worker_id: self.config.worker_id.clone(),
            unit_id: unit_id.clone(),
            outcome,
        })
        .await
    }

    /// Reporting: push the outcome with bounded retries. Exhausting the
    /// budget returns the error so the caller can release the unit; the
    /// coordinator would otherwise hold it in flight indefinitely while
    /// our polls keep refreshing its liveness.
    async fn report(&self, report: OutcomeReport) -> Result<(), TransportError> {
        let mut attempts = 0;
        loop {
            match self.link.submit_outcome(report.clone()).await {
                Ok(()) => return Ok(()),
                Err(TransportError::Remote(RemoteError::UnknownAssignment { .. })) => {
                    // Late redelivery race: someone else already merged it.
                    debug!(unit_id = %report.unit_id, "Outcome superseded; dropping");
                    return Ok(());
                }
                Err(TransportError::Remote(err)) => {
                    debug!(unit_id = %report.unit_id, error = %err, "Outcome refused");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempts < self.config.send_retries => {
                    attempts += 1;
                    warn!(
                        unit_id = %report.unit_id,
                        attempt = attempts,
                        error = %err,
                        "Outcome report failed; retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(err) => {
                    warn!(
                        unit_id = %report.unit_id,
                        error = %err,
                        "Outcome undeliverable"
                    );
                    return Err(err);
                }
            }
        }
    }
}

async fn run_heartbeat_loop(
    link: Arc<dyn CoordinatorLink>,
    config: WorkerConfig,
    drained: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(config.heartbeat_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so registration settles.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match link
            .heartbeat(Heartbeat {
                worker_id: config.worker_id.clone(),
            })
            .await
        {
            Ok(ack) if ack.terminated => {
                drained.store(true, Ordering::SeqCst);
                return;
            }
            Ok(_) => {}
            Err(TransportError::Remote(RemoteError::Terminated)) => {
                drained.store(true, Ordering::SeqCst);
                return;
            }
            Err(err) => {
                warn!(worker_id = %config.worker_id, error = %err, "Heartbeat failed");
            }
        }
    }
}
