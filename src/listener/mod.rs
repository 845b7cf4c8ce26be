//! Listener capabilities invoked by the client.
//!
//! All callbacks run on the client's dispatch thread, one at a time, in
//! enqueue order — never on the caller thread or the raw protocol callback
//! thread. Implementations must therefore not block on the client's own
//! waiting operations.

mod registry;

pub(crate) use registry::*;

use crate::SessionState;

/// Observes payload changes of a single subscribed path.
pub trait DataListener: Send + Sync {
    /// The node's payload changed (or the node was just created). `data` is
    /// the payload re-read after the watch was renewed.
    fn on_data_changed(
        &self,
        path: &str,
        data: &[u8],
    );

    /// The node was deleted.
    fn on_data_deleted(
        &self,
        path: &str,
    );
}

/// Observes membership changes of a subscribed path's children.
pub trait ChildListener: Send + Sync {
    /// The child list changed. `children` is `None` when the path itself no
    /// longer exists.
    fn on_children_changed(
        &self,
        path: &str,
        children: Option<Vec<String>>,
    );
}

/// Observes session state transitions. Not path-scoped.
pub trait StateListener: Send + Sync {
    fn on_state_changed(
        &self,
        state: SessionState,
    );

    /// The previous session expired and a fresh one was established. All
    /// ephemeral nodes and watches of the old session are gone.
    fn on_new_session(&self);
}
