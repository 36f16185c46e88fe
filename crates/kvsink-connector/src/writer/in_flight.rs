//! Counter of submitted writes whose completion has not been reported yet.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// In-flight write counter with an async drain barrier.
///
/// `decrement` wakes every waiter when the count reaches zero, so
/// `wait_until_zero` never polls.
#[derive(Debug, Default)]
pub struct InFlightCounter {
    count: AtomicUsize,
    drained: Notify,
}

impl InFlightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Record one completion. A decrement at zero is ignored and logged.
    pub fn decrement(&self) {
        let previous = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match previous {
            Ok(1) => self.drained.notify_waiters(),
            Ok(_) => {}
            Err(_) => tracing::error!("in-flight counter decremented below zero"),
        }
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait until no writes are in flight.
    pub async fn wait_until_zero(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a drain between the check and the await is not missed.
            notified.as_mut().enable();
            let count = self.get();
            if count == 0 {
                return;
            }
            tracing::trace!(in_flight = count, "waiting for in-flight writes");
            notified.await;
        }
    }
}
