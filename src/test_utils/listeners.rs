use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;

use crate::ChildListener;
use crate::DataListener;
use crate::SessionState;
use crate::StateListener;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    Changed(String, Vec<u8>),
    Deleted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    StateChanged(SessionState),
    NewSession,
}

/// FIFO of recorded events with a blocking pop, shared by the recording
/// listeners below.
struct EventLog<T> {
    events: Mutex<Vec<T>>,
    cond: Condvar,
}

impl<T: Clone> EventLog<T> {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cond: Condvar::new(),
        }
    }

    fn push(
        &self,
        event: T,
    ) {
        self.events.lock().push(event);
        self.cond.notify_all();
    }

    fn pop_timeout(
        &self,
        timeout: Duration,
    ) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.events.lock();
        loop {
            if !guard.is_empty() {
                return Some(guard.remove(0));
            }
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return None;
            }
        }
    }

    fn snapshot(&self) -> Vec<T> {
        self.events.lock().clone()
    }
}

pub struct RecordingDataListener {
    log: EventLog<DataEvent>,
}

impl RecordingDataListener {
    pub fn new() -> Self {
        Self {
            log: EventLog::new(),
        }
    }

    /// Pop the oldest recorded event, waiting up to `timeout` for one.
    pub fn wait_for_event(
        &self,
        timeout: Duration,
    ) -> Option<DataEvent> {
        self.log.pop_timeout(timeout)
    }

    pub fn events(&self) -> Vec<DataEvent> {
        self.log.snapshot()
    }
}

impl DataListener for RecordingDataListener {
    fn on_data_changed(
        &self,
        path: &str,
        data: &[u8],
    ) {
        self.log.push(DataEvent::Changed(path.to_string(), data.to_vec()));
    }

    fn on_data_deleted(
        &self,
        path: &str,
    ) {
        self.log.push(DataEvent::Deleted(path.to_string()));
    }
}

pub struct RecordingChildListener {
    log: EventLog<(String, Option<Vec<String>>)>,
}

impl RecordingChildListener {
    pub fn new() -> Self {
        Self {
            log: EventLog::new(),
        }
    }

    pub fn wait_for_event(
        &self,
        timeout: Duration,
    ) -> Option<(String, Option<Vec<String>>)> {
        self.log.pop_timeout(timeout)
    }

    pub fn events(&self) -> Vec<(String, Option<Vec<String>>)> {
        self.log.snapshot()
    }
}

impl ChildListener for RecordingChildListener {
    fn on_children_changed(
        &self,
        path: &str,
        children: Option<Vec<String>>,
    ) {
        self.log.push((path.to_string(), children));
    }
}

pub struct RecordingStateListener {
    log: EventLog<StateEvent>,
}

impl RecordingStateListener {
    pub fn new() -> Self {
        Self {
            log: EventLog::new(),
        }
    }

    pub fn wait_for_event(
        &self,
        timeout: Duration,
    ) -> Option<StateEvent> {
        self.log.pop_timeout(timeout)
    }

    pub fn events(&self) -> Vec<StateEvent> {
        self.log.snapshot()
    }

    pub fn new_session_count(&self) -> usize {
        self.log
            .snapshot()
            .iter()
            .filter(|e| matches!(e, StateEvent::NewSession))
            .count()
    }
}

impl StateListener for RecordingStateListener {
    fn on_state_changed(
        &self,
        state: SessionState,
    ) {
        self.log.push(StateEvent::StateChanged(state));
    }

    fn on_new_session(&self) {
        self.log.push(StateEvent::NewSession);
    }
}
