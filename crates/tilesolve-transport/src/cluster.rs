//! In-process message-passing substrate.
//!
//! Members share a [`ClusterBus`]; each request travels as a typed
//! [`ClusterEnvelope`] with a oneshot reply channel, the coordinator side
//! drains the bus inbox and answers. Joining is discovering the bus
//! handle; a dropped handle is a departure.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use tilesolve_core::{
    Heartbeat, Leave, LivenessAck, OutcomeReport, Register, RemoteError, WorkRequest, WorkReply,
};

use crate::{CoordinatorLink, TransportError};

/// A request traveling over the bus.
#[derive(Debug)]
pub enum ClusterRequest {
    Register(Register),
    RequestWork(WorkRequest),
    Outcome(OutcomeReport),
    Heartbeat(Heartbeat),
    Leave(Leave),
}

/// A reply traveling back over the envelope's oneshot channel.
#[derive(Debug)]
pub enum ClusterReply {
    Ack,
    Work(WorkReply),
    Liveness(LivenessAck),
}

/// One request plus its reply channel.
#[derive(Debug)]
pub struct ClusterEnvelope {
    pub request: ClusterRequest,
    pub reply: oneshot::Sender<Result<ClusterReply, RemoteError>>,
}

/// Shared bus handle. Cloning it is how new members discover the
/// coordinator; the paired receiver is the coordinator's inbox.
#[derive(Clone)]
pub struct ClusterBus {
    tx: mpsc::Sender<ClusterEnvelope>,
}

impl ClusterBus {
    /// Create a bus and the coordinator-side inbox.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ClusterEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// A worker-side link onto this bus.
    pub fn link(&self) -> ClusterLink {
        ClusterLink {
            tx: self.tx.clone(),
        }
    }
}

/// Worker-side realization of [`CoordinatorLink`] over the bus.
#[derive(Clone)]
pub struct ClusterLink {
    tx: mpsc::Sender<ClusterEnvelope>,
}

impl ClusterLink {
    async fn call(&self, request: ClusterRequest) -> Result<ClusterReply, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = ClusterEnvelope {
            request,
            reply: reply_tx,
        };
        self.tx
            .send(envelope)
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        let result = reply_rx.await.map_err(|_| TransportError::ChannelClosed)?;
        result.map_err(TransportError::Remote)
    }
}

#[async_trait]
impl CoordinatorLink for ClusterLink {
    async fn register(&self, msg: Register) -> Result<(), TransportError> {
        match self.call(ClusterRequest::Register(msg)).await? {
            ClusterReply::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn request_work(&self, msg: WorkRequest) -> Result<WorkReply, TransportError> {
        match self.call(ClusterRequest::RequestWork(msg)).await? {
            ClusterReply::Work(reply) => Ok(reply),
            other => Err(unexpected(other)),
        }
    }

    async fn submit_outcome(&self, msg: OutcomeReport) -> Result<(), TransportError> {
        match self.call(ClusterRequest::Outcome(msg)).await? {
            ClusterReply::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn heartbeat(&self, msg: Heartbeat) -> Result<LivenessAck, TransportError> {
        match self.call(ClusterRequest::Heartbeat(msg)).await? {
            ClusterReply::Liveness(ack) => Ok(ack),
            other => Err(unexpected(other)),
        }
    }

    async fn leave(&self, msg: Leave) -> Result<(), TransportError> {
        match self.call(ClusterRequest::Leave(msg)).await? {
            ClusterReply::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: ClusterReply) -> TransportError {
    TransportError::Unreachable(format!("mismatched cluster reply: {:?}", reply))
}
