//! Sink task: maps each record and hands it to the writer.
//!
//! ```text
//! put(records)
//!   └─ per record: channel lookup → MapperRegistry → RecordMapper → RecordWriter::write
//! flush()
//!   └─ RecordWriter::flush (drains in-flight writes, raises aggregated failures)
//! ```
//!
//! Records that fail to map are logged and dropped; the batch continues.
//! Records whose bins are all dropped are skipped. A topic without channel
//! settings or a record of unsupported shape fails the task.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SinkConfig;
use crate::error::{ConnectorError, Result};
use crate::mapping::MapperRegistry;
use crate::storage::StorageConnector;
use crate::traits::{SinkConnector, SinkRecord};
use crate::writer::{self, RecordWriter};

/// Per-task record counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Records passed to `put`.
    pub received: u64,
    /// Records handed to the writer.
    pub written: u64,
    /// Records dropped because they could not be mapped.
    pub dropped: u64,
    /// Records skipped because no bins remained after mapping.
    pub skipped_empty: u64,
}

pub struct KvSinkTask {
    name: String,
    config: SinkConfig,
    storage: Arc<dyn StorageConnector>,
    registry: MapperRegistry,
    writer: Option<Box<dyn RecordWriter>>,
    stats: TaskStats,
}

impl KvSinkTask {
    /// Create a task from a raw config map.
    pub fn new(
        name: &str,
        topics: &[String],
        config_map: &HashMap<String, String>,
        storage: Arc<dyn StorageConnector>,
    ) -> Result<Self> {
        let config = SinkConfig::from_config_map(topics, config_map)?;
        Ok(Self::with_config(name, config, storage))
    }

    /// Create with an already-validated config.
    pub fn with_config(name: &str, config: SinkConfig, storage: Arc<dyn StorageConnector>) -> Self {
        Self {
            name: name.to_string(),
            config,
            storage,
            registry: MapperRegistry::new(),
            writer: None,
            stats: TaskStats::default(),
        }
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    pub fn is_started(&self) -> bool {
        self.writer.is_some()
    }

    fn writer(&self) -> Result<&dyn RecordWriter> {
        self.writer.as_deref().ok_or_else(|| {
            ConnectorError::RuntimeError(format!("task '{}' has not been started", self.name))
        })
    }
}

#[async_trait]
impl SinkConnector for KvSinkTask {
    async fn start(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let writer = writer::connect(self.storage.as_ref(), &self.config).await?;
        tracing::info!(
            connector = %self.name,
            hosts = self.config.hosts.len(),
            write_mode = ?self.config.write_mode,
            "kvsink task started"
        );
        self.writer = Some(writer);
        Ok(())
    }

    async fn put(&mut self, records: &[SinkRecord]) -> Result<()> {
        let writer = self.writer.as_deref().ok_or_else(|| {
            ConnectorError::RuntimeError(format!("task '{}' has not been started", self.name))
        })?;

        for record in records {
            self.stats.received += 1;

            let channel = self.config.channel(&record.topic).ok_or_else(|| {
                ConnectorError::ConfigError(format!(
                    "no channel configuration for topic '{}'",
                    record.topic
                ))
            })?;
            let mapper = self.registry.get_mapper(record)?;

            match mapper.convert(record, channel) {
                Ok(mapped) if mapped.bins.is_empty() => {
                    tracing::debug!(
                        connector = %self.name,
                        topic = %record.topic,
                        offset = record.offset,
                        "skipping record without bins"
                    );
                    self.stats.skipped_empty += 1;
                }
                Ok(mapped) => {
                    tracing::trace!(key = %mapped.key, bins = mapped.bins.len(), "writing record");
                    writer.write(mapped).await?;
                    self.stats.written += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        connector = %self.name,
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        timestamp = record.timestamp,
                        error = %e,
                        "dropping record that could not be mapped"
                    );
                    self.stats.dropped += 1;
                }
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        tracing::debug!(connector = %self.name, "flushing");
        self.writer()?.flush().await
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close().await?;
            tracing::info!(
                connector = %self.name,
                received = self.stats.received,
                written = self.stats.written,
                dropped = self.stats.dropped,
                skipped_empty = self.stats.skipped_empty,
                "kvsink task stopped"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
