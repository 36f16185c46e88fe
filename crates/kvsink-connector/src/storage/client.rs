//! Storage client interface.
//!
//! The connector talks to the key/value store only through these traits:
//! `StorageConnector::connect` produces a `StorageClient`, which supports a
//! synchronous `put`, a callback-based `put_async` and `close`.
//!
//! `put_async` returns once the command has been handed to the client. The
//! outcome is reported to the `WriteListener` exactly once, from whichever
//! task completes the command, possibly before `put_async` returns (for
//! example when the command is rejected).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::policy::{ClientPolicy, Host, WritePolicy};
use super::types::{Bin, MappedRecord, StorageKey};

/// Failure reported by the store for a single command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("command rejected: {0}")]
    CommandRejected(String),

    #[error("command timed out after {0}")]
    Timeout(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("record already exists")]
    RecordExists,

    #[error("record not found")]
    RecordNotFound,

    #[error("client is closed")]
    ClientClosed,

    #[error("server error: {0}")]
    Server(String),
}

impl StoreError {
    /// Rejections, timeouts and connection failures may succeed if retried.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            StoreError::CommandRejected(_) | StoreError::Timeout(_) | StoreError::Connection(_)
        )
    }
}

/// Completion callback for asynchronous writes.
pub trait WriteListener: Send + Sync {
    fn on_success(&self, key: &StorageKey);
    fn on_failure(&self, key: &StorageKey, error: StoreError);
}

/// Handle to a connected store.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Write bins and wait for the outcome.
    async fn put(
        &self,
        policy: &WritePolicy,
        key: &StorageKey,
        bins: &[Bin],
    ) -> std::result::Result<(), StoreError>;

    /// Submit a write; the outcome goes to `listener`.
    ///
    /// Suspends only while waiting for a command slot under
    /// `MaxCommandAction::Block`.
    async fn put_async(
        &self,
        policy: &WritePolicy,
        listener: Arc<dyn WriteListener>,
        record: MappedRecord,
    );

    /// Release the client. Outstanding commands are not awaited.
    fn close(&self);

    fn is_connected(&self) -> bool;
}

/// Factory for storage clients.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn connect(
        &self,
        hosts: &[Host],
        policy: &ClientPolicy,
    ) -> std::result::Result<Arc<dyn StorageClient>, StoreError>;
}
