//! Asynchronous record writer.
//!
//! `write` submits a put through `StorageClient::put_async` and returns as
//! soon as the client has accepted the command. A shared `ResultListener`
//! tracks completions: every completion decrements the in-flight counter,
//! failures are recorded in the `FailureAggregator`.
//!
//! Failures surface synchronously on the next `write` or `flush`, as one
//! consolidated error carrying the number of failed writes. `flush` is the
//! completion barrier: it returns only once every earlier write has been
//! acknowledged by the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::failure::FailureAggregator;
use super::in_flight::InFlightCounter;
use super::RecordWriter;
use crate::error::{ConnectorError, Result};
use crate::storage::{
    MappedRecord, StorageClient, StorageKey, StoreError, WriteListener, WritePolicy,
};

/// Completion callback shared by all writes of one writer.
pub struct ResultListener {
    in_flight: Arc<InFlightCounter>,
    failures: FailureAggregator,
}

impl ResultListener {
    fn new(in_flight: Arc<InFlightCounter>) -> Self {
        Self {
            in_flight,
            failures: FailureAggregator::new(),
        }
    }

    fn raise_errors(&self) -> Result<()> {
        match self.failures.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl WriteListener for ResultListener {
    fn on_success(&self, key: &StorageKey) {
        tracing::trace!(key = %key, "successfully put record");
        self.in_flight.decrement();
    }

    fn on_failure(&self, key: &StorageKey, error: StoreError) {
        tracing::error!(key = %key, error = %error, "error writing record");
        self.failures.record(error);
        self.in_flight.decrement();
    }
}

pub struct AsyncWriter {
    client: Arc<dyn StorageClient>,
    policy: WritePolicy,
    in_flight: Arc<InFlightCounter>,
    listener: Arc<ResultListener>,
    closed: AtomicBool,
}

impl AsyncWriter {
    pub fn new(client: Arc<dyn StorageClient>, policy: WritePolicy) -> Self {
        tracing::trace!(
            record_exists_action = %policy.record_exists_action,
            expiration = ?policy.expiration,
            "write policy"
        );
        let in_flight = Arc::new(InFlightCounter::new());
        let listener = Arc::new(ResultListener::new(in_flight.clone()));
        Self {
            client,
            policy,
            in_flight,
            listener,
            closed: AtomicBool::new(false),
        }
    }

    /// Writes submitted but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }
}

#[async_trait]
impl RecordWriter for AsyncWriter {
    async fn write(&self, record: MappedRecord) -> Result<()> {
        self.listener.raise_errors()?;
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectorError::RuntimeError("writer is closed".to_string()));
        }
        self.in_flight.increment();
        let listener: Arc<dyn WriteListener> = self.listener.clone();
        self.client.put_async(&self.policy, listener, record).await;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.listener.raise_errors()?;
        self.in_flight.wait_until_zero().await;
        self.listener.raise_errors()
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.client.close();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        Bin, BinValue, ClientPolicy, Host, MaxCommandAction, MemoryCluster, StorageConnector,
        UserKey,
    };
    use std::time::Duration;

    fn key(i: i64) -> StorageKey {
        StorageKey::new("ns", Some("s".to_string()), UserKey::Int64(i))
    }

    fn record(i: i64) -> MappedRecord {
        MappedRecord::new(key(i), vec![Bin::new("i", i)])
    }

    async fn writer(cluster: &MemoryCluster, policy: ClientPolicy) -> AsyncWriter {
        let client = cluster
            .connect(&[Host::new("localhost", 3000)], &policy)
            .await
            .unwrap();
        AsyncWriter::new(client, WritePolicy::default())
    }

    // ---------------------------------------------------------------
    // Happy path
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_flush_waits_for_all_writes() {
        let cluster = MemoryCluster::new();
        cluster.set_latency(Duration::from_millis(5));
        let w = writer(&cluster, ClientPolicy::default()).await;
        for i in 0..20 {
            w.write(record(i)).await.unwrap();
        }
        w.flush().await.unwrap();
        assert_eq!(w.in_flight(), 0);
        for i in 0..20 {
            assert_eq!(
                cluster.get(&key(i)).unwrap().bin("i"),
                Some(&BinValue::Int64(i))
            );
        }
    }

    #[tokio::test]
    async fn test_flush_with_nothing_in_flight() {
        let cluster = MemoryCluster::new();
        let w = writer(&cluster, ClientPolicy::default()).await;
        w.flush().await.unwrap();
    }

    // ---------------------------------------------------------------
    // Failure aggregation
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_one_timeout_raises_retriable_on_flush() {
        let cluster = MemoryCluster::new();
        cluster.inject_failure(StoreError::Timeout("1000ms".to_string()));
        let w = writer(&cluster, ClientPolicy::default()).await;
        w.write(record(1)).await.unwrap();
        w.write(record(2)).await.unwrap();

        let err = w.flush().await.unwrap_err();
        assert!(err.is_retriable());
        assert!(matches!(err, ConnectorError::RetriableWrite { count: 1, .. }));
        assert_eq!(cluster.len(), 1);

        // state cleared after raising
        w.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_failure_raised_on_next_write() {
        let cluster = MemoryCluster::new();
        cluster.inject_failure(StoreError::RecordExists);
        let w = writer(&cluster, ClientPolicy::default()).await;
        w.write(record(1)).await.unwrap();
        w.flush().await.unwrap_err();

        cluster.inject_failure(StoreError::Server("bad".into()));
        w.write(record(2)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while w.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        let err = w.write(record(3)).await.unwrap_err();
        assert!(matches!(err, ConnectorError::WriteFailed { count: 1, .. }));
        assert!(cluster.get(&key(3)).is_none());
    }

    #[tokio::test]
    async fn test_reject_surfaces_through_flush() {
        let cluster = MemoryCluster::new();
        cluster.set_latency(Duration::from_millis(20));
        let w = writer(
            &cluster,
            ClientPolicy {
                max_commands: 1,
                max_command_action: MaxCommandAction::Reject,
            },
        )
        .await;
        w.write(record(1)).await.unwrap();
        // second write is rejected inline; the error is raised on the next call
        w.write(record(2)).await.unwrap();
        let err = w.flush().await.unwrap_err();
        assert!(err.is_retriable());
        w.flush().await.unwrap();
        assert_eq!(w.in_flight(), 0);
        assert_eq!(cluster.len(), 1);
    }

    #[tokio::test]
    async fn test_block_bounds_concurrency_without_loss() {
        let cluster = MemoryCluster::new();
        cluster.set_latency(Duration::from_millis(2));
        let w = writer(
            &cluster,
            ClientPolicy {
                max_commands: 4,
                max_command_action: MaxCommandAction::Block,
            },
        )
        .await;
        for i in 0..50 {
            w.write(record(i)).await.unwrap();
        }
        w.flush().await.unwrap();
        assert_eq!(cluster.len(), 50);
        assert!(cluster.peak_in_flight() <= 4);
    }

    #[tokio::test]
    async fn test_accept_exceeds_limit_without_loss() {
        let cluster = MemoryCluster::new();
        cluster.set_latency(Duration::from_millis(5));
        let w = writer(
            &cluster,
            ClientPolicy {
                max_commands: 2,
                max_command_action: MaxCommandAction::Accept,
            },
        )
        .await;
        for i in 0..20 {
            w.write(record(i)).await.unwrap();
        }
        w.flush().await.unwrap();
        assert_eq!(w.in_flight(), 0);
        assert_eq!(cluster.len(), 20);
        assert!(cluster.peak_in_flight() > 2);
    }

    // ---------------------------------------------------------------
    // Close
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let cluster = MemoryCluster::new();
        let w = writer(&cluster, ClientPolicy::default()).await;
        w.close().await.unwrap();
        let err = w.write(record(1)).await.unwrap_err();
        assert!(matches!(err, ConnectorError::RuntimeError(_)));
        assert_eq!(w.in_flight(), 0);
        w.close().await.unwrap();
    }
}
