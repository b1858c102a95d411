//! Countdown barrier released once every participant has finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// A one-shot countdown barrier.
///
/// Starts at `n`; [`CountdownLatch::wait`] resolves once the count reaches
/// zero. Counting down past zero is a no-op.
#[derive(Debug)]
pub struct CountdownLatch {
    remaining: AtomicUsize,
    released: Notify,
}

impl CountdownLatch {
    /// Create a latch expecting `count` count-downs.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            released: Notify::new(),
        }
    }

    /// Decrement the count, releasing waiters when it reaches zero.
    ///
    /// Returns the remaining count.
    pub fn count_down(&self) -> usize {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                self.released.notify_waiters();
                0
            }
            Ok(n) => n - 1,
            Err(_) => 0,
        }
    }

    /// Count-downs still outstanding.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Wait until the count reaches zero.
    pub async fn wait(&self) {
        loop {
            let released = self.released.notified();
            if self.remaining() == 0 {
                return;
            }
            released.await;
        }
    }

    /// A guard that counts down once when dropped.
    pub fn guard(self: &Arc<Self>) -> LatchGuard {
        LatchGuard {
            latch: Arc::clone(self),
        }
    }
}

/// Counts its latch down exactly once on drop, whether the owner finished,
/// failed, panicked or was never run.
#[derive(Debug)]
pub struct LatchGuard {
    latch: Arc<CountdownLatch>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch.count_down();
    }
}
