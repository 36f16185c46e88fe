//! Synchronous record writer: each `write` waits for the store's answer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::RecordWriter;
use crate::error::{ConnectorError, Result};
use crate::storage::{MappedRecord, StorageClient, WritePolicy};

pub struct SyncWriter {
    client: Arc<dyn StorageClient>,
    policy: WritePolicy,
    closed: AtomicBool,
}

impl SyncWriter {
    pub fn new(client: Arc<dyn StorageClient>, policy: WritePolicy) -> Self {
        Self {
            client,
            policy,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RecordWriter for SyncWriter {
    async fn write(&self, record: MappedRecord) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectorError::RuntimeError("writer is closed".to_string()));
        }
        self.client
            .put(&self.policy, &record.key, &record.bins)
            .await
            .map_err(|e| {
                tracing::error!(key = %record.key, error = %e, "error writing record");
                let retriable = e.is_retriable();
                ConnectorError::from_write_failures(1, e, retriable)
            })
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.client.close();
        }
        Ok(())
    }
}
