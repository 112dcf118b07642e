//! Worker configuration.

use std::time::Duration;

use tilesolve_core::WorkerId;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker ID.
    pub worker_id: WorkerId,

    /// Transport-specific locator reported at registration.
    pub address: String,

    /// Delay between polls when no work is available.
    pub poll_interval: Duration,

    /// Heartbeat interval.
    pub heartbeat_interval: Duration,

    /// Bounded retry count for sends (registration, outcome reports).
    pub send_retries: u32,

    /// Backoff between send retries.
    pub retry_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: WorkerId::generate(),
            address: "local".to_string(),
            poll_interval: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(15),
            send_retries: 3,
            retry_backoff: Duration::from_millis(250),
        }
    }
}
