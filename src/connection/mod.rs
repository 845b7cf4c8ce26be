//! Connection layer: the raw protocol capability and its thin wrapper.
//!
//! The crate does not implement the coordination protocol's wire format.
//! Any client satisfying [`RawConnection`] can be plugged in; the service's
//! watch semantics (one-shot per registration, fired on data/children/
//! existence change, session-scoped) are assumed.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::Result;
use crate::Watcher;

/// Node lifetime and naming mode at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateMode {
    /// Survives the session that created it.
    Persistent,
    /// Persistent, with a monotonically increasing suffix appended.
    PersistentSequential,
    /// Deleted automatically when the creating session ends.
    Ephemeral,
    /// Ephemeral, with a monotonically increasing suffix appended.
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(&self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// Node metadata returned by reads and writes. The version is the input to
/// optimistic writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    pub version: i32,
    pub num_children: u32,
    /// Creation time, milliseconds since the epoch.
    pub ctime_ms: i64,
    /// Last modification time, milliseconds since the epoch.
    pub mtime_ms: i64,
}

/// One operation of an atomic multi-update.
#[derive(Debug, Clone)]
pub enum MultiOp {
    Create {
        path: String,
        data: Vec<u8>,
        mode: CreateMode,
    },
    Delete {
        path: String,
    },
    Write {
        path: String,
        data: Vec<u8>,
        expected_version: i32,
    },
    Check {
        path: String,
        version: i32,
    },
}

/// Per-operation result of a successful multi-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiResult {
    Created(String),
    Deleted,
    Written(NodeStat),
    Checked,
}

/// Capability set of the underlying protocol client.
///
/// Implementations perform single protocol round trips and surface failures
/// through the crate's error taxonomy. No retry and no listener logic at
/// this level. `connect` after `close` must establish a fresh session and
/// deliver its events to the given watcher on the implementation's callback
/// thread.
#[cfg_attr(test, mockall::automock)]
pub trait RawConnection: Send + Sync {
    fn connect(
        &self,
        watcher: Arc<dyn Watcher>,
    ) -> Result<()>;

    fn close(&self) -> Result<()>;

    /// Create a node. Returns the actual path, which differs from the input
    /// for sequential modes.
    fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<String>;

    fn delete(
        &self,
        path: &str,
    ) -> Result<()>;

    /// `watch` arms an existence watch for the path, whether or not the node
    /// currently exists.
    fn exists(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<bool>;

    fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<String>>;

    fn read_data(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<(Vec<u8>, NodeStat)>;

    /// `expected_version` of -1 writes unconditionally.
    fn write_data(
        &self,
        path: &str,
        data: &[u8],
        expected_version: i32,
    ) -> Result<NodeStat>;

    fn multi(
        &self,
        ops: Vec<MultiOp>,
    ) -> Result<Vec<MultiResult>>;

    /// Target address string, for logs and timeout errors.
    fn servers(&self) -> String;

    fn create_time(
        &self,
        path: &str,
    ) -> Result<i64>;
}

/// Thin pass-through to the underlying protocol client.
///
/// Exists so the orchestrator's retry policy has a single no-retry seam to
/// wrap; every method maps one-to-one onto the capability.
pub(crate) struct Connection {
    raw: Arc<dyn RawConnection>,
}

impl Connection {
    pub(crate) fn new(raw: Arc<dyn RawConnection>) -> Self {
        Self { raw }
    }

    pub(crate) fn connect(
        &self,
        watcher: Arc<dyn Watcher>,
    ) -> Result<()> {
        debug!("connecting to [{}]", self.raw.servers());
        self.raw.connect(watcher)
    }

    pub(crate) fn close(&self) -> Result<()> {
        self.raw.close()
    }

    pub(crate) fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<String> {
        self.raw.create(path, data, mode)
    }

    pub(crate) fn delete(
        &self,
        path: &str,
    ) -> Result<()> {
        self.raw.delete(path)
    }

    pub(crate) fn exists(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<bool> {
        self.raw.exists(path, watch)
    }

    pub(crate) fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<String>> {
        self.raw.get_children(path, watch)
    }

    pub(crate) fn read_data(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<(Vec<u8>, NodeStat)> {
        self.raw.read_data(path, watch)
    }

    pub(crate) fn write_data(
        &self,
        path: &str,
        data: &[u8],
        expected_version: i32,
    ) -> Result<NodeStat> {
        self.raw.write_data(path, data, expected_version)
    }

    pub(crate) fn multi(
        &self,
        ops: Vec<MultiOp>,
    ) -> Result<Vec<MultiResult>> {
        self.raw.multi(ops)
    }

    pub(crate) fn servers(&self) -> String {
        self.raw.servers()
    }

    pub(crate) fn create_time(
        &self,
        path: &str,
    ) -> Result<i64> {
        self.raw.create_time(path)
    }
}
