//! Membership/Transport layer.
//!
//! Workers and the coordinator are written purely against
//! [`CoordinatorLink`]; the two conforming realizations are:
//!
//! - [`cluster`]: an in-process message-passing substrate where members
//!   exchange typed envelopes over a shared bus and replies come back on
//!   oneshot channels.
//! - [`http`]: a remote-call substrate where the coordinator is a fixed,
//!   discoverable HTTP endpoint and workers call it synchronously.
//!
//! Either realization is a drop-in transport: both carry exactly the
//! logical wire messages from `tilesolve-core`.

pub mod cluster;
pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use tilesolve_core::{
    Heartbeat, Leave, LivenessAck, OutcomeReport, Register, RemoteError, WorkRequest, WorkReply,
};

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The coordinator could not be reached; retryable by the sender up
    /// to its bounded retry budget, then recovered via the liveness sweep.
    #[error("coordinator unreachable: {0}")]
    Unreachable(String),

    /// The coordinator answered with a protocol error.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The transport was shut down underneath the caller.
    #[error("transport channel closed")]
    ChannelClosed,
}

impl TransportError {
    /// True for failures worth retrying on the same transport.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// The coordinator's contract as seen from a worker.
///
/// `join`/`leave` map to `register`/`leave`; `send` maps to the typed
/// request methods; the heartbeat primitive doubles as the liveness
/// signal and the drain notification channel.
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
    /// Join the cluster.
    async fn register(&self, msg: Register) -> Result<(), TransportError>;

    /// Pull the next work unit, if any.
    async fn request_work(&self, msg: WorkRequest) -> Result<WorkReply, TransportError>;

    /// Push the outcome for an assigned unit.
    async fn submit_outcome(&self, msg: OutcomeReport) -> Result<(), TransportError>;

    /// Signal liveness; the ack carries the termination flag.
    async fn heartbeat(&self, msg: Heartbeat) -> Result<LivenessAck, TransportError>;

    /// Leave the cluster.
    async fn leave(&self, msg: Leave) -> Result<(), TransportError>;
}
