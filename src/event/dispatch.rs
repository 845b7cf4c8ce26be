use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::Error;
use crate::Result;

static EVENT_ID: AtomicU64 = AtomicU64::new(0);

/// A deferred listener notification: a description for the logs plus a
/// zero-argument action. Immutable once created, executed at most once by
/// the dispatch thread, in enqueue order.
pub(crate) struct DeferredEvent {
    description: String,
    action: Box<dyn FnOnce() -> Result<()> + Send + 'static>,
}

impl DeferredEvent {
    pub(crate) fn new<F>(
        description: impl Into<String>,
        action: F,
    ) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            description: description.into(),
            action: Box::new(action),
        }
    }
}

impl std::fmt::Display for DeferredEvent {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "DeferredEvent[{}]", self.description)
    }
}

/// Single dedicated worker consuming a FIFO queue of deferred tasks.
///
/// This is the sole serialization point for listener callbacks: tasks run
/// one at a time, in enqueue order, and never on any other thread. A failing
/// task is logged and does not stop the worker; only an interruption-class
/// failure shuts it down.
pub(crate) struct EventDispatcher {
    tx: Mutex<Option<Sender<DeferredEvent>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    thread_id: ThreadId,
}

impl EventDispatcher {
    /// Spawn the dispatch thread. `name` tags the thread with the target
    /// servers for log readability.
    pub(crate) fn start(name: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<DeferredEvent>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = shutdown.clone();
        let handle = thread::Builder::new()
            .name(format!("treewatch-dispatch-{name}"))
            .spawn(move || Self::run(rx, worker_shutdown))
            .map_err(|e| Error::Protocol(format!("failed to spawn dispatch thread: {e}")))?;
        let thread_id = handle.thread().id();
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            shutdown,
            thread_id,
        })
    }

    fn run(
        rx: Receiver<DeferredEvent>,
        shutdown: Arc<AtomicBool>,
    ) {
        info!("starting event dispatch thread");
        while !shutdown.load(Ordering::Acquire) {
            let event = match rx.recv() {
                Ok(event) => event,
                // Sender dropped: shutdown began.
                Err(_) => break,
            };
            if shutdown.load(Ordering::Acquire) {
                debug!("discarding queued {event}: shutdown in progress");
                break;
            }
            let event_id = EVENT_ID.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("delivering event #{event_id} {event}");
            let DeferredEvent { description, action } = event;
            match action() {
                Ok(()) => {}
                Err(e) if e.stops_dispatch() => {
                    debug!("dispatch thread interrupted by event #{event_id}: {e}");
                    shutdown.store(true, Ordering::Release);
                    break;
                }
                Err(e) => {
                    error!("error handling DeferredEvent[{description}]: {e}");
                }
            }
            debug!("delivering event #{event_id} done");
        }
        info!("event dispatch thread stopped");
    }

    /// Enqueue a task. Silently dropped once shutdown has begun.
    pub(crate) fn send(
        &self,
        event: DeferredEvent,
    ) {
        if self.is_shutdown() {
            debug!("dropping {event}: dispatcher is shut down");
            return;
        }
        debug!("new event: {event}");
        if let Some(tx) = self.tx.lock().as_ref() {
            // A send error means the worker already exited; nothing to do.
            let _ = tx.send(event);
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Thread id of the dispatch worker, for forbidden-thread checks.
    pub(crate) fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Stop the worker: raise the shutdown flag, close the queue (discarding
    /// anything still enqueued) and join with a bounded wait. The task
    /// currently running is allowed to finish.
    pub(crate) fn shutdown(
        &self,
        wait: Duration,
    ) {
        self.shutdown.store(true, Ordering::Release);
        // Dropping the sender wakes a blocked recv().
        drop(self.tx.lock().take());
        if thread::current().id() == self.thread_id {
            // A task holding the last client handle can trigger shutdown from
            // the worker itself; it must not join its own thread.
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            let deadline = std::time::Instant::now() + wait;
            while !handle.is_finished() {
                if std::time::Instant::now() >= deadline {
                    warn!("dispatch thread did not stop within {wait:?}; detaching");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            if handle.join().is_err() {
                error!("dispatch thread panicked during shutdown");
            }
        }
    }
}
