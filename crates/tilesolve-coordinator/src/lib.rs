//! Tilesolve Coordinator
//!
//! Single authoritative owner of global search progress: the pending
//! queue, in-flight assignments, worker membership and liveness, merge
//! logic, and the termination decision. Transport adapters (cluster serve
//! loop, HTTP router) translate wire messages into calls on
//! [`Coordinator`]; the coordinator itself is transport-agnostic.

pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod http;
pub mod state;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, CoordinatorError};
pub use events::SearchEvent;
pub use state::{StatusSnapshot, WorkerSnapshot, WorkerState};
