//! Cooperative stop flag
//!
//! Signal handlers, the admin surface, and the safety governor all stop the
//! run the same way: set the flag, let the loops observe it within one
//! iteration. Nothing is cancelled mid-tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Why the run is stopping; maps to the process exit code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    /// Configured tick budget exhausted
    Completed,
    /// Operator command through the admin surface
    AdminStop,
    /// Termination signal (Ctrl-C / SIGTERM)
    Signal,
    /// Safety governor tripped a kill-switch
    GuardTrip(String),
}

impl StopCause {
    /// Distinguished exit codes; anything non-zero still flushes evidence
    pub fn exit_code(&self) -> u8 {
        match self {
            StopCause::Completed => 0,
            StopCause::AdminStop => 41,
            StopCause::Signal => 42,
            StopCause::GuardTrip(_) => 43,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    cause: Mutex<Option<StopCause>>,
    notify: Notify,
}

/// Shared cooperative cancellation handle
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    inner: Arc<Inner>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag; the first cause wins, later calls are no-ops
    pub fn trigger(&self, cause: StopCause) {
        let mut guard = self.inner.cause.lock().expect("stop flag poisoned");
        if guard.is_none() {
            *guard = Some(cause);
            self.inner.stopped.store(true, Ordering::SeqCst);
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn cause(&self) -> Option<StopCause> {
        self.inner.cause.lock().expect("stop flag poisoned").clone()
    }

    /// Wait until the flag is set
    ///
    /// Interest is registered before the flag is re-checked, so a trigger
    /// landing between the check and the await cannot be missed.
    pub async fn wait(&self) {
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}
