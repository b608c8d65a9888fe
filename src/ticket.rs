//! One-shot completion latch for an in-flight build.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Marks a build in progress. Every caller that joins the build holds an
/// `Arc<Ticket>` and blocks in [`wait`](Ticket::wait) until the builder calls
/// [`complete`](Ticket::complete); all of them are released at once.
#[derive(Debug, Default)]
pub(crate) struct Ticket {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Ticket {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fires the latch. Later calls are no-ops.
    pub(crate) fn complete(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.signal.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn is_complete(&self) -> bool {
        *self.done.lock()
    }

    /// Blocks until the latch fires. Returns immediately if it already has.
    pub(crate) fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.signal.wait(&mut done);
        }
    }

    /// Blocks until the latch fires or `timeout` elapses.
    ///
    /// Returns whether the latch fired.
    pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let mut done = self.done.lock();
        while !*done {
            if self.signal.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }
}
