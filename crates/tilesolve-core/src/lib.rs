//! Tilesolve Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime
//! - Transport specifics
//!
//! All types here represent the core search domain of tilesolve: boards,
//! work units, outcomes, the local solver, and the logical wire messages
//! both transports carry.

pub mod board;
pub mod ids;
pub mod outcome;
pub mod solver;
pub mod unit;
pub mod wire;

// Re-export commonly used types
pub use board::{Board, BoardError, Move};
pub use ids::{UnitId, WorkerId};
pub use outcome::Outcome;
pub use solver::{DepthBoundedSolver, Solver, SolverConfig};
pub use unit::{split, WorkUnit};
pub use wire::{Heartbeat, Leave, LivenessAck, OutcomeReport, Register, RemoteError, WorkReply, WorkRequest};
