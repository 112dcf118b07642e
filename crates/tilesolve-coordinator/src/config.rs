//! Coordinator configuration.

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Heartbeat silence before a worker is considered unreachable (seconds).
    pub heartbeat_timeout_secs: u64,

    /// Liveness sweep period (seconds).
    pub sweep_interval_secs: u64,

    /// Overdue sweeps tolerated before a worker handle is dropped for good.
    pub max_strikes: u32,

    /// Minimum number of units the initial board is split into.
    pub fanout: usize,

    /// Expansion budget each unit starts with.
    pub unit_budget: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 45,
            sweep_interval_secs: 5,
            max_strikes: 3,
            fanout: 8,
            unit_budget: 60,
        }
    }
}
