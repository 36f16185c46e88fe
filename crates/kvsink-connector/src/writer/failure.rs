//! Aggregation of asynchronous write failures.
//!
//! Completion callbacks record failures here; the writer takes them on its
//! next `write` or `flush`. Taking clears the state, so each failure window
//! is raised exactly once.

use std::sync::{Mutex, PoisonError};

use crate::error::ConnectorError;
use crate::storage::StoreError;

#[derive(Debug)]
struct Pending {
    first: StoreError,
    count: usize,
    retriable: bool,
}

#[derive(Debug, Default)]
pub struct FailureAggregator {
    pending: Mutex<Option<Pending>>,
}

impl FailureAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. The first error is kept; one non-retriable failure
    /// makes the whole window non-retriable.
    pub fn record(&self, error: StoreError) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.as_mut() {
            Some(p) => {
                p.count += 1;
                p.retriable &= error.is_retriable();
            }
            None => {
                *pending = Some(Pending {
                    retriable: error.is_retriable(),
                    first: error,
                    count: 1,
                });
            }
        }
    }

    /// Take the aggregated failure, if any, clearing the state.
    pub fn take(&self) -> Option<ConnectorError> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|p| ConnectorError::from_write_failures(p.count, p.first, p.retriable))
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
