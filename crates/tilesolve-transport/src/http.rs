//! Remote-call substrate: the coordinator as a fixed HTTP endpoint.
//!
//! Workers call the coordinator synchronously; the request bodies and
//! error payloads are the same logical wire messages the cluster bus
//! carries. The server side lives with the coordinator.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use tilesolve_core::{
    Heartbeat, Leave, LivenessAck, OutcomeReport, Register, RemoteError, WorkRequest, WorkReply,
};

use crate::{CoordinatorLink, TransportError};

/// Worker-side realization of [`CoordinatorLink`] over HTTP.
#[derive(Clone)]
pub struct HttpLink {
    base_url: String,
    client: reqwest::Client,
}

/// Empty JSON ack body for requests without a payload in the answer.
#[derive(Debug, serde::Deserialize)]
struct Acked {}

impl HttpLink {
    /// Create a link against a coordinator base URL, e.g. `http://host:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn post<Req, Resp>(&self, route: &str, body: &Req) -> Result<Resp, TransportError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), route);
        debug!(url = %url, "Calling coordinator");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        if response.status().is_success() {
            response
                .json::<Resp>()
                .await
                .map_err(|e| TransportError::Unreachable(e.to_string()))
        } else {
            // Protocol errors come back as serialized RemoteError bodies.
            let status = response.status();
            match response.json::<RemoteError>().await {
                Ok(remote) => Err(TransportError::Remote(remote)),
                Err(_) => Err(TransportError::Unreachable(format!(
                    "unexpected status {}",
                    status
                ))),
            }
        }
    }
}

#[async_trait]
impl CoordinatorLink for HttpLink {
    async fn register(&self, msg: Register) -> Result<(), TransportError> {
        self.post::<_, Acked>("/v1/register", &msg).await.map(|_| ())
    }

    async fn request_work(&self, msg: WorkRequest) -> Result<WorkReply, TransportError> {
        self.post("/v1/work", &msg).await
    }

    async fn submit_outcome(&self, msg: OutcomeReport) -> Result<(), TransportError> {
        self.post::<_, Acked>("/v1/outcome", &msg).await.map(|_| ())
    }

    async fn heartbeat(&self, msg: Heartbeat) -> Result<LivenessAck, TransportError> {
        self.post("/v1/heartbeat", &msg).await
    }

    async fn leave(&self, msg: Leave) -> Result<(), TransportError> {
        self.post::<_, Acked>("/v1/leave", &msg).await.map(|_| ())
    }
}
