//! In-memory simulated coordination service.
//!
//! Implements [`RawConnection`] against a shared node tree with real
//! one-shot watch semantics: each watch registration fires once and is
//! consumed. Events are delivered on a dedicated per-session callback
//! thread, so client code under test sees the same three execution contexts
//! it sees in production. Fault injection covers connection loss, session
//! expiry and a server that never finishes the handshake.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;

use crate::CreateMode;
use crate::Error;
use crate::MultiOp;
use crate::MultiResult;
use crate::NodeEventKind;
use crate::NodeStat;
use crate::RawConnection;
use crate::Result;
use crate::SessionState;
use crate::WatchedEvent;
use crate::Watcher;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Parent path in the simulated namespace; the root `/` is its own ceiling.
fn sim_parent(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let idx = path.rfind('/')?;
    Some(if idx == 0 {
        "/".to_string()
    } else {
        path[..idx].to_string()
    })
}

struct SimNode {
    data: Vec<u8>,
    version: i32,
    ctime_ms: i64,
    mtime_ms: i64,
    ephemeral_owner: Option<u64>,
    next_sequence: u64,
}

struct Session {
    tx: Sender<WatchedEvent>,
    connected: bool,
}

struct ClusterState {
    nodes: BTreeMap<String, SimNode>,
    sessions: HashMap<u64, Session>,
    next_session_id: u64,
    /// One-shot watch registrations: session ids per path, drained on fire.
    data_watches: HashMap<String, Vec<u64>>,
    child_watches: HashMap<String, Vec<u64>>,
    /// How many times a watch was requested per path, across all ops.
    watch_requests: HashMap<String, u64>,
    /// Number of upcoming requests to fail with `ConnectionLoss`.
    fail_connection_loss: u32,
    /// When set, `connect` establishes a session but never reports it.
    silent_connect: bool,
}

impl ClusterState {
    fn children_of(
        &self,
        path: &str,
    ) -> Vec<String> {
        self.nodes
            .keys()
            .filter_map(|key| {
                if sim_parent(key).as_deref() == Some(path) {
                    Some(key[key.rfind('/').unwrap_or(0) + 1..].to_string())
                } else {
                    None
                }
            })
            .collect()
    }

    fn stat_of(
        &self,
        path: &str,
    ) -> Result<NodeStat> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        Ok(NodeStat {
            version: node.version,
            num_children: self.children_of(path).len() as u32,
            ctime_ms: node.ctime_ms,
            mtime_ms: node.mtime_ms,
        })
    }

    fn fire_data_watches(
        &mut self,
        path: &str,
        kind: NodeEventKind,
    ) {
        let Some(watchers) = self.data_watches.remove(path) else {
            return;
        };
        for sid in watchers {
            if let Some(session) = self.sessions.get(&sid) {
                let _ = session.tx.send(WatchedEvent::Node {
                    path: path.to_string(),
                    kind,
                });
            }
        }
    }

    fn fire_child_watches(
        &mut self,
        path: &str,
        kind: NodeEventKind,
    ) {
        let Some(watchers) = self.child_watches.remove(path) else {
            return;
        };
        for sid in watchers {
            if let Some(session) = self.sessions.get(&sid) {
                let _ = session.tx.send(WatchedEvent::Node {
                    path: path.to_string(),
                    kind,
                });
            }
        }
    }

    /// A deletion consumes both the data and the child watch on the path,
    /// but a session watching through both registries gets one event.
    fn fire_deleted_watches(
        &mut self,
        path: &str,
    ) {
        let mut watchers = self.data_watches.remove(path).unwrap_or_default();
        if let Some(more) = self.child_watches.remove(path) {
            watchers.extend(more);
        }
        watchers.sort_unstable();
        watchers.dedup();
        for sid in watchers {
            if let Some(session) = self.sessions.get(&sid) {
                let _ = session.tx.send(WatchedEvent::Node {
                    path: path.to_string(),
                    kind: NodeEventKind::Deleted,
                });
            }
        }
    }

    fn count_watch_request(
        &mut self,
        path: &str,
    ) {
        *self.watch_requests.entry(path.to_string()).or_default() += 1;
    }

    /// Watch registrations are per session: arming twice before the watch
    /// fires still yields a single event.
    fn arm_data_watch(
        &mut self,
        path: &str,
        session_id: u64,
    ) {
        let watchers = self.data_watches.entry(path.to_string()).or_default();
        if !watchers.contains(&session_id) {
            watchers.push(session_id);
        }
    }

    fn arm_child_watch(
        &mut self,
        path: &str,
        session_id: u64,
    ) {
        let watchers = self.child_watches.entry(path.to_string()).or_default();
        if !watchers.contains(&session_id) {
            watchers.push(session_id);
        }
    }

    fn create_node(
        &mut self,
        session_id: u64,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<String> {
        let parent = sim_parent(path)
            .ok_or_else(|| Error::Protocol(format!("cannot create node at {path}")))?;
        if !self.nodes.contains_key(&parent) {
            return Err(Error::NotFound(parent));
        }
        let actual = if mode.is_sequential() {
            let parent_node = self
                .nodes
                .get_mut(&parent)
                .ok_or_else(|| Error::NotFound(parent.clone()))?;
            let seq = parent_node.next_sequence;
            parent_node.next_sequence += 1;
            format!("{path}{seq:010}")
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&actual) {
            return Err(Error::AlreadyExists(actual));
        }
        let now = now_ms();
        self.nodes.insert(
            actual.clone(),
            SimNode {
                data: data.to_vec(),
                version: 0,
                ctime_ms: now,
                mtime_ms: now,
                ephemeral_owner: mode.is_ephemeral().then_some(session_id),
                next_sequence: 0,
            },
        );
        self.fire_data_watches(&actual, NodeEventKind::Created);
        self.fire_child_watches(&parent, NodeEventKind::ChildrenChanged);
        Ok(actual)
    }

    fn delete_node(
        &mut self,
        path: &str,
    ) -> Result<()> {
        if !self.nodes.contains_key(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        if !self.children_of(path).is_empty() {
            return Err(Error::Protocol(format!("node {path} has children")));
        }
        self.nodes.remove(path);
        self.fire_deleted_watches(path);
        if let Some(parent) = sim_parent(path) {
            self.fire_child_watches(&parent, NodeEventKind::ChildrenChanged);
        }
        Ok(())
    }

    fn write_node(
        &mut self,
        path: &str,
        data: &[u8],
        expected_version: i32,
    ) -> Result<NodeStat> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        if expected_version != -1 && node.version != expected_version {
            return Err(Error::VersionConflict {
                path: path.to_string(),
                expected: expected_version,
            });
        }
        node.data = data.to_vec();
        node.version += 1;
        node.mtime_ms = now_ms();
        let stat = self.stat_of(path)?;
        self.fire_data_watches(path, NodeEventKind::DataChanged);
        Ok(stat)
    }

    /// Drop a session: its ephemeral nodes go away (firing watches) and its
    /// callback channel closes.
    fn end_session(
        &mut self,
        session_id: u64,
    ) {
        self.sessions.remove(&session_id);
        let ephemerals: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session_id))
            .map(|(path, _)| path.clone())
            .collect();
        for path in ephemerals {
            let _ = self.delete_node(&path);
        }
    }
}

/// Handle to a simulated service instance shared by any number of
/// connections.
#[derive(Clone)]
pub struct SimulatedCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl SimulatedCluster {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        let now = now_ms();
        nodes.insert(
            "/".to_string(),
            SimNode {
                data: Vec::new(),
                version: 0,
                ctime_ms: now,
                mtime_ms: now,
                ephemeral_owner: None,
                next_sequence: 0,
            },
        );
        Self {
            state: Arc::new(Mutex::new(ClusterState {
                nodes,
                sessions: HashMap::new(),
                next_session_id: 1,
                data_watches: HashMap::new(),
                child_watches: HashMap::new(),
                watch_requests: HashMap::new(),
                fail_connection_loss: 0,
                silent_connect: false,
            })),
        }
    }

    /// A fresh protocol client bound to this cluster.
    pub fn connection(&self) -> Arc<SimulatedConnection> {
        Arc::new(SimulatedConnection {
            cluster: self.state.clone(),
            session: Mutex::new(None),
        })
    }

    /// Fail the next `n` requests with `ConnectionLoss`.
    pub fn fail_requests(
        &self,
        n: u32,
    ) {
        self.state.lock().fail_connection_loss = n;
    }

    /// When set, `connect` never reports the session as established.
    pub fn set_silent_connect(
        &self,
        silent: bool,
    ) {
        self.state.lock().silent_connect = silent;
    }

    /// Watch requests observed for a path, across all operations.
    pub fn watch_request_count(
        &self,
        path: &str,
    ) -> u64 {
        self.state
            .lock()
            .watch_requests
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn node_exists(
        &self,
        path: &str,
    ) -> bool {
        self.state.lock().nodes.contains_key(path)
    }

    pub fn node_data(
        &self,
        path: &str,
    ) -> Option<Vec<u8>> {
        self.state.lock().nodes.get(path).map(|n| n.data.clone())
    }
}

/// A protocol client talking to a [`SimulatedCluster`]. One session at a
/// time; `connect` after expiry or close establishes a fresh session.
pub struct SimulatedConnection {
    cluster: Arc<Mutex<ClusterState>>,
    session: Mutex<Option<u64>>,
}

impl SimulatedConnection {
    /// Kill the current session server-side and notify the watcher, exactly
    /// like a real expiry: ephemerals vanish, watches are dropped and every
    /// subsequent request fails with `SessionExpired` until a reconnect.
    pub fn expire_session(&self) {
        let mut state = self.cluster.lock();
        if let Some(sid) = *self.session.lock() {
            if let Some(session) = state.sessions.get(&sid) {
                let _ = session.tx.send(WatchedEvent::State(SessionState::Expired));
            }
            state.end_session(sid);
        }
    }

    /// Simulate a transport drop: requests fail with `ConnectionLoss` until
    /// [`restore_connection`](Self::restore_connection).
    pub fn drop_connection(&self) {
        let mut state = self.cluster.lock();
        if let Some(sid) = *self.session.lock() {
            if let Some(session) = state.sessions.get_mut(&sid) {
                session.connected = false;
                let _ = session
                    .tx
                    .send(WatchedEvent::State(SessionState::Disconnected));
            }
        }
    }

    pub fn restore_connection(&self) {
        let mut state = self.cluster.lock();
        if let Some(sid) = *self.session.lock() {
            if let Some(session) = state.sessions.get_mut(&sid) {
                session.connected = true;
                let _ = session.tx.send(WatchedEvent::State(SessionState::Connected));
            }
        }
    }

    /// Validate the session and apply pending fault injection.
    fn checked_session(
        &self,
        state: &mut ClusterState,
    ) -> Result<u64> {
        if state.fail_connection_loss > 0 {
            state.fail_connection_loss -= 1;
            return Err(Error::ConnectionLoss);
        }
        let sid = self.session.lock().ok_or(Error::ConnectionLoss)?;
        match state.sessions.get(&sid) {
            Some(session) if session.connected => Ok(sid),
            Some(_) => Err(Error::ConnectionLoss),
            None => Err(Error::SessionExpired),
        }
    }
}

impl RawConnection for SimulatedConnection {
    fn connect(
        &self,
        watcher: Arc<dyn Watcher>,
    ) -> Result<()> {
        let mut state = self.cluster.lock();
        let sid = state.next_session_id;
        state.next_session_id += 1;
        let (tx, rx) = mpsc::channel::<WatchedEvent>();
        thread::Builder::new()
            .name(format!("sim-callback-{sid}"))
            .spawn(move || {
                while let Ok(event) = rx.recv() {
                    watcher.process(event);
                }
            })
            .map_err(|e| Error::Protocol(format!("failed to spawn callback thread: {e}")))?;
        if !state.silent_connect {
            let _ = tx.send(WatchedEvent::State(SessionState::Connected));
        }
        state.sessions.insert(
            sid,
            Session {
                tx,
                connected: true,
            },
        );
        *self.session.lock() = Some(sid);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.cluster.lock();
        if let Some(sid) = self.session.lock().take() {
            state.end_session(sid);
        }
        Ok(())
    }

    fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<String> {
        let mut state = self.cluster.lock();
        let sid = self.checked_session(&mut state)?;
        state.create_node(sid, path, data, mode)
    }

    fn delete(
        &self,
        path: &str,
    ) -> Result<()> {
        let mut state = self.cluster.lock();
        self.checked_session(&mut state)?;
        state.delete_node(path)
    }

    fn exists(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<bool> {
        let mut state = self.cluster.lock();
        let sid = self.checked_session(&mut state)?;
        if watch {
            state.count_watch_request(path);
            state.arm_data_watch(path, sid);
        }
        Ok(state.nodes.contains_key(path))
    }

    fn get_children(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<Vec<String>> {
        let mut state = self.cluster.lock();
        let sid = self.checked_session(&mut state)?;
        if !state.nodes.contains_key(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        if watch {
            state.count_watch_request(path);
            state.arm_child_watch(path, sid);
        }
        Ok(state.children_of(path))
    }

    fn read_data(
        &self,
        path: &str,
        watch: bool,
    ) -> Result<(Vec<u8>, NodeStat)> {
        let mut state = self.cluster.lock();
        let sid = self.checked_session(&mut state)?;
        if !state.nodes.contains_key(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        if watch {
            state.count_watch_request(path);
            state.arm_data_watch(path, sid);
        }
        let stat = state.stat_of(path)?;
        let data = state
            .nodes
            .get(path)
            .map(|n| n.data.clone())
            .unwrap_or_default();
        Ok((data, stat))
    }

    fn write_data(
        &self,
        path: &str,
        data: &[u8],
        expected_version: i32,
    ) -> Result<NodeStat> {
        let mut state = self.cluster.lock();
        self.checked_session(&mut state)?;
        state.write_node(path, data, expected_version)
    }

    fn multi(
        &self,
        ops: Vec<MultiOp>,
    ) -> Result<Vec<MultiResult>> {
        let mut state = self.cluster.lock();
        let sid = self.checked_session(&mut state)?;
        // Precheck the whole batch against the current tree so it applies
        // fully or not at all.
        for op in &ops {
            match op {
                MultiOp::Create { path, mode, .. } => {
                    let parent = sim_parent(path)
                        .ok_or_else(|| Error::Protocol(format!("cannot create node at {path}")))?;
                    if !state.nodes.contains_key(&parent) {
                        return Err(Error::NotFound(parent));
                    }
                    if !mode.is_sequential() && state.nodes.contains_key(path) {
                        return Err(Error::AlreadyExists(path.clone()));
                    }
                }
                MultiOp::Delete { path } => {
                    if !state.nodes.contains_key(path) {
                        return Err(Error::NotFound(path.clone()));
                    }
                    if !state.children_of(path).is_empty() {
                        return Err(Error::Protocol(format!("node {path} has children")));
                    }
                }
                MultiOp::Write {
                    path,
                    expected_version,
                    ..
                }
                | MultiOp::Check {
                    path,
                    version: expected_version,
                } => {
                    let node = state
                        .nodes
                        .get(path)
                        .ok_or_else(|| Error::NotFound(path.clone()))?;
                    if *expected_version != -1 && node.version != *expected_version {
                        return Err(Error::VersionConflict {
                            path: path.clone(),
                            expected: *expected_version,
                        });
                    }
                }
            }
        }
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                MultiOp::Create { path, data, mode } => {
                    results.push(MultiResult::Created(
                        state.create_node(sid, &path, &data, mode)?,
                    ));
                }
                MultiOp::Delete { path } => {
                    state.delete_node(&path)?;
                    results.push(MultiResult::Deleted);
                }
                MultiOp::Write {
                    path,
                    data,
                    expected_version,
                } => {
                    results.push(MultiResult::Written(state.write_node(
                        &path,
                        &data,
                        expected_version,
                    )?));
                }
                MultiOp::Check { .. } => {
                    results.push(MultiResult::Checked);
                }
            }
        }
        Ok(results)
    }

    fn servers(&self) -> String {
        "sim://cluster".to_string()
    }

    fn create_time(
        &self,
        path: &str,
    ) -> Result<i64> {
        let mut state = self.cluster.lock();
        self.checked_session(&mut state)?;
        state.stat_of(path).map(|stat| stat.ctime_ms)
    }
}
