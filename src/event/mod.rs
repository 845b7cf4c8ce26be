//! Raw event model shared between the protocol callback thread and the
//! client orchestrator.
//!
//! The underlying protocol client delivers [`WatchedEvent`]s through the
//! [`Watcher`] capability. Events either carry a session state transition
//! (no path) or describe a change to a single node (path + kind). The
//! orchestrator classifies them under the event lock and turns them into
//! deferred listener notifications.

mod dispatch;
mod lock;

pub(crate) use dispatch::*;
pub(crate) use lock::*;

use serde::Deserialize;
use serde::Serialize;

/// Session state reported by the coordination service.
///
/// A client instance holds a single authoritative value, mutated only under
/// the event lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Expired,
    AuthFailed,
    Closed,
}

/// Kind of change observed on a watched node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEventKind {
    Created,
    Deleted,
    DataChanged,
    ChildrenChanged,
}

impl NodeEventKind {
    /// Changes that concern child listeners on the path.
    pub(crate) fn affects_children(&self) -> bool {
        matches!(
            self,
            NodeEventKind::Created | NodeEventKind::Deleted | NodeEventKind::ChildrenChanged
        )
    }

    /// Changes that concern data listeners on the path.
    pub(crate) fn affects_data(&self) -> bool {
        matches!(
            self,
            NodeEventKind::Created | NodeEventKind::Deleted | NodeEventKind::DataChanged
        )
    }
}

/// A single notification from the raw protocol client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchedEvent {
    /// Session state transition; no path attached.
    State(SessionState),

    /// One-shot watch fired for `path`. The watch is consumed: nothing else
    /// arrives for the path until a new watch is requested.
    Node { path: String, kind: NodeEventKind },
}

/// Capability through which the raw protocol client hands events to the
/// orchestrator. Invoked on the protocol client's own callback thread.
pub trait Watcher: Send + Sync {
    fn process(&self, event: WatchedEvent);
}
