//! HTTP server: the coordinator as a fixed remote-call endpoint.
//!
//! Routes mirror the logical wire messages one-to-one; protocol errors
//! come back as serialized `RemoteError` bodies so the HTTP link can
//! surface the same taxonomy the cluster bus does.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tilesolve_core::{Heartbeat, Leave, LivenessAck, OutcomeReport, Register, WorkReply, WorkRequest};

use crate::coordinator::{Coordinator, CoordinatorError};
use crate::state::StatusSnapshot;

/// Empty JSON ack body.
#[derive(Serialize)]
struct Ack {}

/// Protocol error mapped onto an HTTP response.
struct ApiError(CoordinatorError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoordinatorError::Terminated => StatusCode::CONFLICT,
            CoordinatorError::UnknownWorker(_) => StatusCode::NOT_FOUND,
            CoordinatorError::UnknownAssignment { .. } => StatusCode::CONFLICT,
        };
        (status, Json(self.0.to_remote())).into_response()
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        Self(err)
    }
}

/// Create the HTTP router.
pub fn router(coordinator: Arc<Coordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/register", post(register))
        .route("/v1/work", post(request_work))
        .route("/v1/outcome", post(submit_outcome))
        .route("/v1/heartbeat", post(heartbeat))
        .route("/v1/leave", post(leave))
        .route("/v1/status", get(status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(coordinator)
}

async fn register(
    State(coordinator): State<Arc<Coordinator>>,
    Json(msg): Json<Register>,
) -> Result<Json<Ack>, ApiError> {
    coordinator.register_worker(msg).await?;
    Ok(Json(Ack {}))
}

async fn request_work(
    State(coordinator): State<Arc<Coordinator>>,
    Json(msg): Json<WorkRequest>,
) -> Result<Json<WorkReply>, ApiError> {
    let reply = coordinator.request_work(&msg.worker_id).await?;
    Ok(Json(reply))
}

async fn submit_outcome(
    State(coordinator): State<Arc<Coordinator>>,
    Json(report): Json<OutcomeReport>,
) -> Result<Json<Ack>, ApiError> {
    coordinator.submit_outcome(report).await?;
    Ok(Json(Ack {}))
}

async fn heartbeat(
    State(coordinator): State<Arc<Coordinator>>,
    Json(msg): Json<Heartbeat>,
) -> Result<Json<LivenessAck>, ApiError> {
    let terminated = coordinator.heartbeat(&msg.worker_id).await?;
    Ok(Json(LivenessAck { terminated }))
}

async fn leave(
    State(coordinator): State<Arc<Coordinator>>,
    Json(msg): Json<Leave>,
) -> Result<Json<Ack>, ApiError> {
    coordinator.leave(&msg.worker_id).await?;
    Ok(Json(Ack {}))
}

async fn status(State(coordinator): State<Arc<Coordinator>>) -> Json<StatusSnapshot> {
    Json(coordinator.snapshot().await)
}

async fn health() -> &'static str {
    "OK"
}
