//! Client module for tree-structured coordination services
//!
//! Provides the resilient client wrapper and its construction surface:
//! - [`TreeClient`] - Main entry point; hides session churn, re-arms
//!   one-shot watches and serializes listener delivery
//! - [`ClientBuilder`] - Configurable client construction
//! - [`ClientConfig`] - Connection and retry tunables
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use treewatch::{CreateMode, RawConnection, TreeClient};
//!
//! fn run(raw: Arc<dyn RawConnection>) -> treewatch::Result<()> {
//!     let client = TreeClient::builder(raw)
//!         .connect_timeout(Duration::from_secs(3))
//!         .build()?;
//!
//!     client.create_persistent("/app/config", true)?;
//!     client.write_data("/app/config", b"v1")?;
//!
//!     let (data, stat) = client.read_data("/app/config")?;
//!     println!("payload {:?} at version {}", data, stat.version);
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

mod builder;
mod config;

pub use builder::*;
pub use config::*;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::thread;
use std::thread::ThreadId;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use rand::Rng;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::constants;
use crate::event::DeferredEvent;
use crate::event::EventDispatcher;
use crate::event::EventLock;
use crate::listener::ListenerRegistry;
use crate::utils;
use crate::ChildListener;
use crate::Connection;
use crate::CreateMode;
use crate::DataListener;
use crate::Error;
use crate::MultiOp;
use crate::MultiResult;
use crate::NodeEventKind;
use crate::NodeStat;
use crate::RawConnection;
use crate::Result;
use crate::SessionState;
use crate::StateListener;
use crate::WatchedEvent;
use crate::Watcher;

/// Main entry point for interacting with a tree-structured coordination
/// service.
///
/// Owns the connection, the listener registries and the dispatch thread for
/// its lifetime. Handles are cheap to clone and share one underlying client
/// instance. [`close()`](TreeClient::close) is terminal.
///
/// Created through the [`builder()`](TreeClient::builder) method.
#[derive(Clone)]
pub struct TreeClient {
    core: Arc<ClientCore>,
}

pub(crate) struct ClientCore {
    connection: Connection,
    listeners: ListenerRegistry,
    event_lock: EventLock,
    dispatcher: EventDispatcher,
    config: ClientConfig,
    shutdown: AtomicBool,
    /// Raw protocol callback thread, recorded on every `process` call; the
    /// id changes across reconnects.
    callback_thread: Mutex<Option<ThreadId>>,
    me: Weak<ClientCore>,
}

impl TreeClient {
    /// Create a configured client builder around an injected protocol
    /// client.
    pub fn builder(raw: Arc<dyn RawConnection>) -> ClientBuilder {
        ClientBuilder::new(raw)
    }

    pub(crate) fn connect(
        raw: Arc<dyn RawConnection>,
        config: ClientConfig,
    ) -> Result<TreeClient> {
        let servers = raw.servers();
        let dispatcher = EventDispatcher::start(&servers)?;
        let connect_timeout = config.connect_timeout;
        let core = Arc::new_cyclic(|me| ClientCore {
            connection: Connection::new(raw),
            listeners: ListenerRegistry::new(),
            event_lock: EventLock::new(),
            dispatcher,
            config,
            shutdown: AtomicBool::new(false),
            callback_thread: Mutex::new(None),
            me: me.clone(),
        });
        info!("awaiting connection to [{servers}] for up to {connect_timeout:?}");
        let connected = core
            .connection
            .connect(core.clone())
            .and_then(|_| core.wait_for_state(SessionState::Connected, connect_timeout));
        match connected {
            Ok(true) => Ok(TreeClient { core }),
            Ok(false) => {
                core.close_internal();
                Err(Error::ConnectTimeout {
                    servers,
                    timeout: connect_timeout,
                })
            }
            Err(e) => {
                core.close_internal();
                Err(e)
            }
        }
    }

    // -
    // Node creation

    /// Create a node. Returns the actual path, which carries the sequence
    /// suffix for sequential modes.
    ///
    /// # Errors
    /// - [`Error::AlreadyExists`] when the node is present
    /// - [`Error::NotFound`] when the parent is missing
    pub fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<String> {
        utils::validate_path(path)?;
        self.core
            .retry_until_connected(|| self.core.connection.create(path, data, mode))
    }

    /// Create a persistent node with an empty payload. With `create_parents`
    /// set, missing ancestors are created recursively and an existing node
    /// is tolerated.
    pub fn create_persistent(
        &self,
        path: &str,
        create_parents: bool,
    ) -> Result<()> {
        match self.create(path, &[], CreateMode::Persistent) {
            Ok(_) => Ok(()),
            Err(e) if e.is_already_exists() && create_parents => Ok(()),
            Err(e) if e.is_not_found() && create_parents => {
                let parent = utils::parent_path(path)
                    .ok_or_else(|| Error::NotFound(path.to_string()))?;
                self.create_persistent(parent, true)?;
                self.create_persistent(path, true)
            }
            Err(e) => Err(e),
        }
    }

    /// Create a persistent node holding `data`.
    pub fn create_persistent_with_data(
        &self,
        path: &str,
        data: &[u8],
    ) -> Result<()> {
        self.create(path, data, CreateMode::Persistent).map(|_| ())
    }

    /// Create a persistent node with a monotonically increasing suffix.
    pub fn create_persistent_sequential(
        &self,
        path: &str,
        data: &[u8],
    ) -> Result<String> {
        self.create(path, data, CreateMode::PersistentSequential)
    }

    /// Create an ephemeral node with an empty payload.
    pub fn create_ephemeral(
        &self,
        path: &str,
    ) -> Result<()> {
        self.create(path, &[], CreateMode::Ephemeral).map(|_| ())
    }

    /// Create an ephemeral node holding `data`.
    pub fn create_ephemeral_with_data(
        &self,
        path: &str,
        data: &[u8],
    ) -> Result<()> {
        self.create(path, data, CreateMode::Ephemeral).map(|_| ())
    }

    /// Create an ephemeral node with a monotonically increasing suffix.
    pub fn create_ephemeral_sequential(
        &self,
        path: &str,
        data: &[u8],
    ) -> Result<String> {
        self.create(path, data, CreateMode::EphemeralSequential)
    }

    // -
    // Node deletion

    /// Delete a node.
    ///
    /// # Returns
    /// `false` when the node does not exist; absence is never an error here.
    pub fn delete(
        &self,
        path: &str,
    ) -> Result<bool> {
        match self
            .core
            .retry_until_connected(|| self.core.connection.delete(path))
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete a node and all of its descendants, children before parents.
    ///
    /// # Returns
    /// `true` also when the path never existed; the operation is idempotent.
    pub fn delete_recursive(
        &self,
        path: &str,
    ) -> Result<bool> {
        let children = match self
            .core
            .retry_until_connected(|| self.core.connection.get_children(path, false))
        {
            Ok(children) => children,
            Err(e) if e.is_not_found() => return Ok(true),
            Err(e) => return Err(e),
        };
        for child in children {
            if !self.delete_recursive(&format!("{path}/{child}"))? {
                return Ok(false);
            }
        }
        self.delete(path)
    }

    // -
    // Reads

    /// Whether the node exists. Requests a watch exactly when a listener is
    /// registered for the path.
    pub fn exists(
        &self,
        path: &str,
    ) -> Result<bool> {
        let watch = self.core.listeners.has_listeners(path);
        self.core
            .retry_until_connected(|| self.core.connection.exists(path, watch))
    }

    /// Child names of a node.
    ///
    /// # Errors
    /// - [`Error::NotFound`] when the node is absent
    pub fn get_children(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        let watch = self.core.listeners.has_listeners(path);
        self.core
            .retry_until_connected(|| self.core.connection.get_children(path, watch))
    }

    /// Number of children, from the node's stat. `None` when the node is
    /// absent.
    pub fn count_children(
        &self,
        path: &str,
    ) -> Result<Option<u32>> {
        match self.read_data(path) {
            Ok((_, stat)) => Ok(Some(stat.num_children)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read a node's payload and stat.
    ///
    /// # Errors
    /// - [`Error::NotFound`] when the node is absent; see
    ///   [`try_read_data`](TreeClient::try_read_data) for the tolerant form
    pub fn read_data(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, NodeStat)> {
        let watch = self.core.listeners.has_listeners(path);
        self.core
            .retry_until_connected(|| self.core.connection.read_data(path, watch))
    }

    /// Read a node's payload and stat, mapping absence to `None` instead of
    /// an error.
    pub fn try_read_data(
        &self,
        path: &str,
    ) -> Result<Option<(Vec<u8>, NodeStat)>> {
        match self.read_data(path) {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // -
    // Writes

    /// Overwrite a node's payload unconditionally.
    pub fn write_data(
        &self,
        path: &str,
        data: &[u8],
    ) -> Result<NodeStat> {
        self.write_data_versioned(path, data, -1)
    }

    /// Overwrite a node's payload if its current version matches
    /// `expected_version` (-1 writes unconditionally).
    ///
    /// # Errors
    /// - [`Error::VersionConflict`] when the stored version moved on
    pub fn write_data_versioned(
        &self,
        path: &str,
        data: &[u8],
        expected_version: i32,
    ) -> Result<NodeStat> {
        self.core
            .retry_until_connected(|| self.core.connection.write_data(path, data, expected_version))
    }

    /// Optimistic read-modify-write.
    ///
    /// Reads the current payload, applies `update` and writes the result
    /// back with the observed version. On a version conflict the node is
    /// re-read and `update` applied again, so it must be a pure function of
    /// its input. Retries are unbounded unless
    /// [`ClientConfig::cas_max_attempts`] caps them; each conflict backs off
    /// with a short jittered sleep.
    pub fn cas<F>(
        &self,
        path: &str,
        update: F,
    ) -> Result<NodeStat>
    where
        F: Fn(&[u8]) -> Vec<u8>,
    {
        let mut attempts: u32 = 0;
        loop {
            let (current, stat) = self.read_data(path)?;
            let next = update(&current);
            match self.write_data_versioned(path, &next, stat.version) {
                Ok(stat) => return Ok(stat),
                Err(e) if e.is_version_conflict() => {
                    attempts += 1;
                    if let Some(max) = self.core.config.cas_max_attempts {
                        if attempts >= max {
                            return Err(e);
                        }
                    }
                    debug!("cas conflict on {path} (attempt {attempts}); retrying");
                    cas_backoff(attempts);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute a batch of operations atomically.
    pub fn multi(
        &self,
        ops: Vec<MultiOp>,
    ) -> Result<Vec<MultiResult>> {
        self.core
            .retry_until_connected(|| self.core.connection.multi(ops.clone()))
    }

    /// Creation time of a node, milliseconds since the epoch.
    pub fn get_creation_time(
        &self,
        path: &str,
    ) -> Result<i64> {
        self.core.connection.create_time(path)
    }

    // -
    // Subscriptions

    /// Register a data listener and arm the protocol-level watch before
    /// returning.
    pub fn subscribe_data_changes(
        &self,
        path: &str,
        listener: Arc<dyn DataListener>,
    ) -> Result<()> {
        self.core.listeners.subscribe_data(path, &listener);
        self.core.watch_for_data(path)?;
        debug!("subscribed data changes for {path}");
        Ok(())
    }

    pub fn unsubscribe_data_changes(
        &self,
        path: &str,
        listener: &Arc<dyn DataListener>,
    ) {
        self.core.listeners.unsubscribe_data(path, listener);
    }

    /// Register a child listener and arm the protocol-level watch before
    /// returning.
    ///
    /// # Returns
    /// The child list observed while arming the watch; `None` when the path
    /// does not exist yet (the existence watch still fires on creation).
    pub fn subscribe_child_changes(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> Result<Option<Vec<String>>> {
        self.core.listeners.subscribe_children(path, &listener);
        self.core.watch_for_children(path)
    }

    pub fn unsubscribe_child_changes(
        &self,
        path: &str,
        listener: &Arc<dyn ChildListener>,
    ) {
        self.core.listeners.unsubscribe_children(path, listener);
    }

    pub fn subscribe_state_changes(
        &self,
        listener: Arc<dyn StateListener>,
    ) {
        self.core.listeners.subscribe_state(&listener);
    }

    pub fn unsubscribe_state_changes(
        &self,
        listener: &Arc<dyn StateListener>,
    ) {
        self.core.listeners.unsubscribe_state(listener);
    }

    /// Drop every data, child and state listener.
    pub fn unsubscribe_all(&self) {
        self.core.listeners.clear();
    }

    /// Total listener count across all registries.
    pub fn number_of_listeners(&self) -> usize {
        self.core.listeners.len()
    }

    // -
    // Blocking waits

    /// Block until the session reaches [`SessionState::Connected`] or the
    /// timeout passes. Returns `false` on timeout.
    pub fn wait_until_connected(
        &self,
        timeout: Duration,
    ) -> Result<bool> {
        self.wait_for_state(SessionState::Connected, timeout)
    }

    /// Block until the session reaches `state` or the timeout passes.
    ///
    /// # Errors
    /// - [`Error::WrongThread`] when called from the callback or dispatch
    ///   thread - blocking there would starve the signal itself
    /// - [`Error::Shutdown`] once close has begun
    pub fn wait_for_state(
        &self,
        state: SessionState,
        timeout: Duration,
    ) -> Result<bool> {
        self.core.wait_for_state(state, timeout)
    }

    /// Block until `path` exists or the timeout passes, re-checking with a
    /// watched exists call on every wake. Returns `false` on timeout.
    pub fn wait_until_exists(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<bool> {
        self.core.wait_until_exists(path, timeout)
    }

    // -
    // State accessors

    pub fn is_connected(&self) -> bool {
        *self.core.event_lock.lock() == Some(SessionState::Connected)
    }

    /// Current session state; `None` before the first state notification and
    /// after close.
    pub fn session_state(&self) -> Option<SessionState> {
        *self.core.event_lock.lock()
    }

    /// Target address string of the underlying connection.
    pub fn servers(&self) -> String {
        self.core.connection.servers()
    }

    /// Shut the client down: stop the dispatch thread (bounded wait,
    /// remaining queued tasks discarded), close the underlying connection
    /// and clear the session state. Idempotent; reconnection after close is
    /// undefined.
    pub fn close(&self) {
        self.core.close_internal();
    }
}

impl ClientCore {
    /// Execute `op`, blocking on reconnection and retrying for as long as it
    /// fails with a connectivity-class error. Any other failure propagates
    /// untouched.
    fn retry_until_connected<T>(
        &self,
        op: impl Fn() -> Result<T>,
    ) -> Result<T> {
        self.ensure_not_event_thread("retry_until_connected")?;
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(Error::Shutdown);
            }
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_connectivity() => {
                    debug!("operation failed ({e}); waiting for reconnect");
                    thread::yield_now();
                    // A timed-out wait falls through and re-probes the
                    // operation; a shutdown mid-wait propagates.
                    self.wait_for_state(SessionState::Connected, constants::RETRY_WAIT_INTERVAL)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn wait_for_state(
        &self,
        target: SessionState,
        timeout: Duration,
    ) -> Result<bool> {
        self.ensure_not_event_thread("wait_for_state")?;
        let deadline = Instant::now() + timeout;
        debug!("waiting for session state {target:?}");
        let mut guard = self.event_lock.lock();
        while *guard != Some(target) {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(Error::Shutdown);
            }
            if self.event_lock.wait_state_changed_until(&mut guard, deadline) {
                return Ok(false);
            }
        }
        debug!("session state is {target:?}");
        Ok(true)
    }

    fn wait_until_exists(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<bool> {
        self.ensure_not_event_thread("wait_until_exists")?;
        let deadline = Instant::now() + timeout;
        info!("waiting until node {path} becomes available");
        let mut guard = self.event_lock.lock();
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(Error::Shutdown);
            }
            // The existence check arms a watch while the event lock is held,
            // so the creation signal cannot slip in between check and wait.
            match self.connection.exists(path, true) {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    if self.event_lock.wait_znode_changed_until(&mut guard, deadline) {
                        return Ok(false);
                    }
                }
                Err(e) if e.is_connectivity() => {
                    if self.event_lock.wait_state_changed_until(&mut guard, deadline) {
                        return Ok(false);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Arm the existence/data watch for a subscribed path, through the retry
    /// wrapper.
    fn watch_for_data(
        &self,
        path: &str,
    ) -> Result<()> {
        self.retry_until_connected(|| self.connection.exists(path, true).map(|_| ()))
    }

    /// Arm existence + child watches for a subscribed path, returning the
    /// child list observed at arm time.
    fn watch_for_children(
        &self,
        path: &str,
    ) -> Result<Option<Vec<String>>> {
        self.retry_until_connected(|| {
            self.connection.exists(path, true)?;
            match self.connection.get_children(path, true) {
                Ok(children) => Ok(Some(children)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    /// Reject blocking calls from the two threads that produce the awaited
    /// signals; blocking there is a self-deadlock.
    fn ensure_not_event_thread(
        &self,
        op: &'static str,
    ) -> Result<()> {
        let current = thread::current().id();
        if current == self.dispatcher.thread_id() {
            return Err(Error::WrongThread {
                op,
                thread: "dispatch",
            });
        }
        if *self.callback_thread.lock() == Some(current) {
            return Err(Error::WrongThread {
                op,
                thread: "protocol callback",
            });
        }
        Ok(())
    }

    // -
    // Raw-event handling

    fn process_state_changed(
        &self,
        state: SessionState,
        guard: &mut MutexGuard<'_, Option<SessionState>>,
    ) {
        info!("session state changed to {state:?}");
        **guard = Some(state);
        self.fire_state_changed(state);
        if state == SessionState::Expired {
            if let Err(e) = self.reconnect(guard) {
                error!("failed to re-establish a session after expiry: {e}");
                return;
            }
            self.fire_new_session();
            // Recovery broadcast: the old session's watches are gone, so
            // every registered listener is re-armed and re-fired.
            self.fire_all_events();
        }
    }

    /// Close and reopen the underlying connection, establishing a fresh
    /// session. Runs on the callback thread, under the event lock.
    fn reconnect(
        &self,
        guard: &mut MutexGuard<'_, Option<SessionState>>,
    ) -> Result<()> {
        let watcher = self.me.upgrade().ok_or(Error::Shutdown)?;
        if let Err(e) = self.connection.close() {
            warn!("error closing expired session: {e}");
        }
        **guard = Some(SessionState::Connecting);
        self.connection.connect(watcher)
    }

    fn process_node_changed(
        &self,
        path: &str,
        kind: NodeEventKind,
    ) {
        if kind.affects_children() {
            self.fire_child_events(path);
        }
        if kind.affects_data() {
            self.fire_data_events(path);
        }
    }

    fn fire_state_changed(
        &self,
        state: SessionState,
    ) {
        for listener in self.listeners.state_listeners() {
            self.dispatcher.send(DeferredEvent::new(
                format!("state changed to {state:?}"),
                move || {
                    listener.on_state_changed(state);
                    Ok(())
                },
            ));
        }
    }

    fn fire_new_session(&self) {
        for listener in self.listeners.state_listeners() {
            self.dispatcher
                .send(DeferredEvent::new("new session established", move || {
                    listener.on_new_session();
                    Ok(())
                }));
        }
    }

    /// Enqueue one re-arm-and-deliver task per data listener on `path`.
    fn fire_data_events(
        &self,
        path: &str,
    ) {
        let listeners = self.listeners.data_listeners(path);
        if listeners.is_empty() {
            return;
        }
        let Some(core) = self.me.upgrade() else {
            return;
        };
        for listener in listeners {
            let core = core.clone();
            let path = path.to_string();
            self.dispatcher.send(DeferredEvent::new(
                format!("data of {path} changed"),
                move || {
                    // Renew the watch lease before reading: a change racing
                    // with this dispatch must be able to fire again.
                    core.connection.exists(&path, true)?;
                    match core.connection.read_data(&path, true) {
                        Ok((data, _stat)) => listener.on_data_changed(&path, &data),
                        Err(e) if e.is_not_found() => listener.on_data_deleted(&path),
                        Err(e) => return Err(e),
                    }
                    Ok(())
                },
            ));
        }
    }

    /// Enqueue one re-arm-and-deliver task per child listener on `path`.
    fn fire_child_events(
        &self,
        path: &str,
    ) {
        let listeners = self.listeners.child_listeners(path);
        if listeners.is_empty() {
            return;
        }
        let Some(core) = self.me.upgrade() else {
            return;
        };
        for listener in listeners {
            let core = core.clone();
            let path = path.to_string();
            self.dispatcher.send(DeferredEvent::new(
                format!("children of {path} changed"),
                move || {
                    // The existence watch keeps firing for a path that is
                    // currently absent, so a reappearing root is noticed.
                    if !core.connection.exists(&path, true)? {
                        listener.on_children_changed(&path, None);
                        return Ok(());
                    }
                    match core.connection.get_children(&path, true) {
                        Ok(children) => listener.on_children_changed(&path, Some(children)),
                        Err(e) if e.is_not_found() => listener.on_children_changed(&path, None),
                        Err(e) => return Err(e),
                    }
                    Ok(())
                },
            ));
        }
    }

    /// Re-fire every registered path listener after a session was rebuilt.
    fn fire_all_events(&self) {
        for path in self.listeners.child_paths() {
            self.fire_child_events(&path);
        }
        for path in self.listeners.data_paths() {
            self.fire_data_events(&path);
        }
    }

    fn close_internal(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("closing client to [{}]", self.connection.servers());
        // Wake every blocked wait so it observes the shutdown flag.
        self.event_lock.notify_all();
        self.dispatcher.shutdown(constants::DISPATCH_SHUTDOWN_WAIT);
        if let Err(e) = self.connection.close() {
            warn!("error closing connection: {e}");
        }
        *self.event_lock.lock() = None;
        self.event_lock.notify_all();
        info!("closing client...done");
    }
}

impl Watcher for ClientCore {
    fn process(
        &self,
        event: WatchedEvent,
    ) {
        debug!("received event: {event:?}");
        *self.callback_thread.lock() = Some(thread::current().id());
        let mut guard = self.event_lock.lock();
        if self.shutdown.load(Ordering::Acquire) {
            debug!("ignoring event {event:?}: shutdown triggered");
            return;
        }
        match &event {
            WatchedEvent::State(state) => {
                self.process_state_changed(*state, &mut guard);
                self.event_lock.notify_state_changed();
                if *state == SessionState::Expired {
                    // Outstanding watches may have been silently dropped by
                    // the remote service; no other signal is guaranteed to
                    // arrive for these conditions.
                    self.event_lock.notify_znode_changed();
                    self.event_lock.notify_data_changed();
                }
            }
            WatchedEvent::Node { path, kind } => {
                self.process_node_changed(path, *kind);
                self.event_lock.notify_znode_changed();
                self.event_lock.notify_data_changed();
            }
        }
        drop(guard);
        debug!("leaving process event");
    }
}

impl Drop for ClientCore {
    fn drop(&mut self) {
        self.close_internal();
    }
}

/// Short jittered sleep between CAS conflict retries.
fn cas_backoff(attempts: u32) {
    let cap = attempts.min(8);
    let units = rand::thread_rng().gen_range(0..(1u64 << cap));
    thread::sleep(constants::CAS_BACKOFF_UNIT * units as u32);
}
