// -
// Client defaults

use std::time::Duration;

/// Default bound for establishing the initial connection.
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

// -
// Retry / shutdown tunables

/// How long a connectivity-gated retry sleeps on the state condition before
/// re-probing the connection.
pub(crate) const RETRY_WAIT_INTERVAL: Duration = Duration::from_secs(30);

/// Bounded wait for the dispatch thread to drain its current task on close.
pub(crate) const DISPATCH_SHUTDOWN_WAIT: Duration = Duration::from_millis(2_000);

/// Base unit for the jittered backoff between CAS conflict retries.
pub(crate) const CAS_BACKOFF_UNIT: Duration = Duration::from_micros(100);
