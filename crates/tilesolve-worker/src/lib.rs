//! Tilesolve Worker
//!
//! Wraps a local solver behind the Idle → Busy → Reporting lifecycle,
//! pulling units from and pushing outcomes to whatever transport realizes
//! the coordinator link.

pub mod config;
pub mod worker;

pub use config::WorkerConfig;
pub use worker::{Worker, WorkerError};
