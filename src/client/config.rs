use std::time::Duration;

use crate::constants::DEFAULT_CONNECT_TIMEOUT;

/// Client configuration parameters for connection and retry management.
///
/// The session timeout itself belongs to the injected protocol client; this
/// struct only carries the knobs the orchestrator enforces.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum time to wait for the initial session to come up.
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Attempt cap for the optimistic read-modify-write loop. `None` retries
    /// indefinitely on version conflicts.
    /// Default: None
    pub cas_max_attempts: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cas_max_attempts: None,
        }
    }
}
