//! Cluster-bus serve loop: the coordinator's end of the message-passing
//! transport.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use tilesolve_core::{LivenessAck, RemoteError};
use tilesolve_transport::cluster::{ClusterEnvelope, ClusterReply, ClusterRequest};

use crate::coordinator::Coordinator;

/// Drain the bus inbox until every member handle is dropped.
///
/// Each envelope is answered on its oneshot; a receiver that gave up
/// waiting is ignored.
pub fn spawn(coordinator: Arc<Coordinator>, mut inbox: mpsc::Receiver<ClusterEnvelope>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = inbox.recv().await {
            let reply = dispatch(&coordinator, envelope.request).await;
            if envelope.reply.send(reply).is_err() {
                debug!("Cluster caller went away before the reply");
            }
        }
    })
}

async fn dispatch(
    coordinator: &Coordinator,
    request: ClusterRequest,
) -> Result<ClusterReply, RemoteError> {
    match request {
        ClusterRequest::Register(msg) => coordinator
            .register_worker(msg)
            .await
            .map(|_| ClusterReply::Ack)
            .map_err(|e| e.to_remote()),
        ClusterRequest::RequestWork(msg) => coordinator
            .request_work(&msg.worker_id)
            .await
            .map(ClusterReply::Work)
            .map_err(|e| e.to_remote()),
        ClusterRequest::Outcome(report) => coordinator
            .submit_outcome(report)
            .await
            .map(|_| ClusterReply::Ack)
            .map_err(|e| e.to_remote()),
        ClusterRequest::Heartbeat(msg) => coordinator
            .heartbeat(&msg.worker_id)
            .await
            .map(|terminated| ClusterReply::Liveness(LivenessAck { terminated }))
            .map_err(|e| e.to_remote()),
        ClusterRequest::Leave(msg) => coordinator
            .leave(&msg.worker_id)
            .await
            .map(|_| ClusterReply::Ack)
            .map_err(|e| e.to_remote()),
    }
}
