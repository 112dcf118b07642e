//! Logical wire messages exchanged between workers and the coordinator.
//!
//! Both transports (in-process cluster bus and HTTP remote call) carry
//! exactly these messages; picking a transport is a deployment decision,
//! never a code change in the worker or coordinator.

use crate::ids::{UnitId, WorkerId};
use crate::outcome::Outcome;
use crate::unit::WorkUnit;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Worker registration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Register {
    /// Unique worker identifier.
    pub worker_id: WorkerId,

    /// Transport-specific locator (hostname, bus endpoint, ...).
    pub address: String,
}

/// Poll for the next available work unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub worker_id: WorkerId,
}

/// Coordinator's answer to a [`WorkRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkReply {
    /// A unit was assigned to the requesting worker.
    Assigned { unit: WorkUnit },

    /// Nothing pending right now; poll again later. Not an error.
    NoWork,

    /// The search terminated; stop polling and leave.
    Drain,
}

/// Outcome report for exactly one assigned unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub worker_id: WorkerId,
    pub unit_id: UnitId,
    pub outcome: Outcome,
}

/// Periodic liveness signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub worker_id: WorkerId,
}

/// Answer to a heartbeat, piggybacking the termination flag so workers
/// learn of a drain without an extra round trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivenessAck {
    pub terminated: bool,
}

/// Explicit departure from the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leave {
    pub worker_id: WorkerId,
}

/// Serializable error taxonomy shared by both transports.
///
/// None of these are fatal to the search: workers log them and either
/// retry, re-register, or drain.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteError {
    /// The search already terminated; no new registrations or assignments.
    #[error("search already terminated")]
    Terminated,

    /// The worker is not (or no longer) a cluster member.
    #[error("unknown worker: {0}")]
    UnknownWorker(String),

    /// An outcome was reported for a unit the worker does not hold,
    /// e.g. after a late redelivery race. Logged and discarded.
    #[error("unit {unit_id} is not assigned to worker {worker_id}")]
    UnknownAssignment { worker_id: String, unit_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    #[test]
    fn test_work_reply_serde_tagging() {
        let json = serde_json::to_string(&WorkReply::NoWork).unwrap();
        assert!(json.contains("NO_WORK"));

        let unit = WorkUnit::root(Board::goal(3).unwrap(), 10);
        let reply = WorkReply::Assigned { unit };
        let round: WorkReply =
            serde_json::from_str(&serde_json::to_string(&reply).unwrap()).unwrap();
        assert_eq!(round, reply);
    }

    #[test]
    fn test_remote_error_serde() {
        let err = RemoteError::UnknownAssignment {
            worker_id: "w1".into(),
            unit_id: "u1".into(),
        };
        let round: RemoteError =
            serde_json::from_str(&serde_json::to_string(&err).unwrap()).unwrap();
        assert_eq!(round, err);
    }
}
