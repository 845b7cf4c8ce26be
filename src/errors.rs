//! Error taxonomy for the coordination client.
//!
//! Variants are grouped by how the retry policy treats them: connectivity
//! failures are recovered inside `retry_until_connected`, version conflicts
//! only inside the CAS loop, and not-found conditions are converted into
//! plain results by the operations that tolerate them.

use std::time::Duration;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The node does not exist.
    #[error("node not found: {0}")]
    NotFound(String),

    /// Creation hit an existing node.
    #[error("node already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic write lost the race: the stored version moved past the
    /// expected one.
    #[error("version conflict on {path}: expected version {expected}")]
    VersionConflict { path: String, expected: i32 },

    /// The connection to the service dropped mid-operation.
    #[error("connection to the coordination service lost")]
    ConnectionLoss,

    /// The session backing all ephemeral nodes and watches expired.
    #[error("session expired")]
    SessionExpired,

    /// The initial connection did not come up within the configured bound.
    #[error("unable to connect to server [{servers}] within {timeout:?}")]
    ConnectTimeout { servers: String, timeout: Duration },

    /// A blocking wait ran past its deadline.
    #[error("timed out waiting for {0}")]
    WaitTimeout(String),

    /// The operation was interrupted before completing.
    #[error("operation interrupted")]
    Interrupted,

    /// The client is shut down; surfaced from waits and retries that would
    /// otherwise block forever.
    #[error("client has been closed")]
    Shutdown,

    /// A blocking operation was invoked from a thread that is itself
    /// responsible for producing the awaited signal.
    #[error("{op} must not be called from the {thread} thread")]
    WrongThread { op: &'static str, thread: &'static str },

    /// Anything else the underlying service reports.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Connectivity-class failures are the only ones `retry_until_connected`
    /// recovers from.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::ConnectionLoss | Error::SessionExpired)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }

    /// Failures that end the dispatch thread instead of being logged.
    pub(crate) fn stops_dispatch(&self) -> bool {
        matches!(self, Error::Interrupted | Error::Shutdown)
    }
}
