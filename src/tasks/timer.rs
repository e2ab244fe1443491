//! Expiry Timer
//!
//! A cancellable one-shot timer that the table re-arms after every mutation
//! that can move its nearest deadline.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Work run when an armed timer fires.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// One-shot timer with at most one pending wake-up.
///
/// Arming replaces any wake-up that is still pending.
pub trait Timer: Send + Sync {
    /// Schedules `task` to run once after `after` has elapsed.
    fn arm(&self, after: Duration, task: TimerTask);

    /// Drops the pending wake-up, if any.
    fn cancel(&self);
}

// == Tokio Timer ==
/// Runs the task on a Tokio runtime after a `tokio::time::sleep`.
pub struct TokioTimer {
    handle: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl TokioTimer {
    /// Creates a timer bound to the current Tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    /// Creates a timer that spawns its wake-ups on `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            pending: Mutex::new(None),
        }
    }
}

impl Timer for TokioTimer {
    fn arm(&self, after: Duration, task: TimerTask) {
        let wake_up = self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            task();
        });

        if let Some(previous) = self.pending.lock().replace(wake_up) {
            previous.abort();
        }
        trace!("Expiry timer armed for {:?}", after);
    }

    fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// == Manual Timer ==
/// Timer that only fires when told to.
///
/// Clones share the same slot, so a test can keep one clone and hand another
/// to the table.
#[derive(Clone, Default)]
pub struct ManualTimer {
    slot: Arc<Mutex<Option<(Duration, TimerTask)>>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration the timer is currently armed for, `None` when disarmed.
    pub fn armed_for(&self) -> Option<Duration> {
        self.slot.lock().as_ref().map(|(after, _)| *after)
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Runs the pending task, returning false if nothing was armed.
    pub fn fire(&self) -> bool {
        // Taken out first: the task usually re-arms this same timer.
        let pending = self.slot.lock().take();
        match pending {
            Some((_, task)) => {
                task();
                true
            }
            None => false,
        }
    }
}

impl Timer for ManualTimer {
    fn arm(&self, after: Duration, task: TimerTask) {
        *self.slot.lock() = Some((after, task));
    }

    fn cancel(&self) {
        self.slot.lock().take();
    }
}
