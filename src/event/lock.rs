use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;
use parking_lot::MutexGuard;

use crate::SessionState;

/// Mutex all raw events are synchronized against, plus the three conditions
/// callers block on.
///
/// The guarded value is the client's current session state (`None` before
/// the first state notification and after close). Every read or write of the
/// state and every wait/signal goes through this lock; blocking operations
/// release it while waiting.
pub(crate) struct EventLock {
    state: Mutex<Option<SessionState>>,
    state_changed: Condvar,
    znode_changed: Condvar,
    data_changed: Condvar,
}

impl EventLock {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(None),
            state_changed: Condvar::new(),
            znode_changed: Condvar::new(),
            data_changed: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<SessionState>> {
        self.state.lock()
    }

    /// Block on the state-changed condition. Returns `true` when the wait
    /// timed out without a signal.
    pub(crate) fn wait_state_changed_until(
        &self,
        guard: &mut MutexGuard<'_, Option<SessionState>>,
        deadline: Instant,
    ) -> bool {
        self.state_changed.wait_until(guard, deadline).timed_out()
    }

    /// Block on the node-existence condition. Returns `true` on timeout.
    pub(crate) fn wait_znode_changed_until(
        &self,
        guard: &mut MutexGuard<'_, Option<SessionState>>,
        deadline: Instant,
    ) -> bool {
        self.znode_changed.wait_until(guard, deadline).timed_out()
    }

    pub(crate) fn notify_state_changed(&self) {
        self.state_changed.notify_all();
    }

    pub(crate) fn notify_znode_changed(&self) {
        self.znode_changed.notify_all();
    }

    pub(crate) fn notify_data_changed(&self) {
        self.data_changed.notify_all();
    }

    /// Wake every waiter. Used on session expiry (outstanding watches may
    /// have been dropped by the remote service) and on shutdown.
    pub(crate) fn notify_all(&self) {
        self.state_changed.notify_all();
        self.znode_changed.notify_all();
        self.data_changed.notify_all();
    }
}
