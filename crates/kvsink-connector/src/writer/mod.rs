//! Writers that hand mapped records to the store.
//!
//! [`AsyncWriter`] pipelines writes and drains them on `flush`;
//! [`SyncWriter`] waits for each write. Both raise write failures as a
//! single consolidated `ConnectorError` classified as retriable or fatal.

use async_trait::async_trait;

use crate::config::{SinkConfig, WriteMode};
use crate::error::{ConnectorError, Result};
use crate::storage::{MappedRecord, StorageConnector};

pub mod async_writer;
pub mod failure;
pub mod in_flight;
pub mod sync_writer;

pub use async_writer::AsyncWriter;
pub use failure::FailureAggregator;
pub use in_flight::InFlightCounter;
pub use sync_writer::SyncWriter;

#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Submit one record, raising any failure pending from earlier writes.
    async fn write(&self, record: MappedRecord) -> Result<()>;

    /// Wait for every submitted write, raising aggregated failures.
    async fn flush(&self) -> Result<()>;

    /// Release the client. Outstanding writes are not awaited.
    async fn close(&self) -> Result<()>;
}

/// Connect to the cluster and build the writer selected by `write.mode`.
pub async fn connect(
    storage: &dyn StorageConnector,
    config: &SinkConfig,
) -> Result<Box<dyn RecordWriter>> {
    let client = storage
        .connect(&config.hosts, &config.client_policy)
        .await
        .map_err(|e| {
            ConnectorError::ConnectionError(format!("error connecting to cluster: {}", e))
        })?;

    let writer: Box<dyn RecordWriter> = match config.write_mode {
        WriteMode::Async => Box::new(AsyncWriter::new(client, config.write_policy.clone())),
        WriteMode::Sync => Box::new(SyncWriter::new(client, config.write_policy.clone())),
    };
    Ok(writer)
}
