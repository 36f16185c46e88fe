//! Connector entry point.
//!
//! `KvSinkConnector` validates a `ConnectorConfig` once and hands out
//! `tasks_max` identical task configurations. Each task owns its own client
//! and writer.

use std::sync::Arc;

use crate::config::{ConnectorConfig, SinkConfig};
use crate::error::{ConnectorError, Result};
use crate::storage::StorageConnector;
use crate::task::KvSinkTask;

pub struct KvSinkConnector {
    config: ConnectorConfig,
    sink_config: SinkConfig,
}

impl KvSinkConnector {
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        if config.tasks_max == 0 {
            return Err(ConnectorError::ConfigError(
                "invalid tasks_max: must be at least 1".to_string(),
            ));
        }
        if config.topics.is_empty() {
            return Err(ConnectorError::ConfigError(
                "missing required 'topics'".to_string(),
            ));
        }
        let sink_config = SinkConfig::from_connector_config(&config)?;

        tracing::info!(
            connector = %config.name,
            topics = ?config.topics,
            tasks_max = config.tasks_max,
            "kvsink connector configured"
        );

        Ok(Self {
            config,
            sink_config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn sink_config(&self) -> &SinkConfig {
        &self.sink_config
    }

    /// One configuration per task, named `<connector>-<index>`.
    pub fn task_configs(&self) -> Vec<ConnectorConfig> {
        (0..self.config.tasks_max)
            .map(|i| ConnectorConfig {
                name: format!("{}-{}", self.config.name, i),
                tasks_max: 1,
                ..self.config.clone()
            })
            .collect()
    }

    /// Build the task at `index`. The task connects on `start`.
    pub fn create_task(
        &self,
        index: usize,
        storage: Arc<dyn StorageConnector>,
    ) -> Result<KvSinkTask> {
        if index >= self.config.tasks_max {
            return Err(ConnectorError::ConfigError(format!(
                "invalid task index {}: connector '{}' has {} task(s)",
                index, self.config.name, self.config.tasks_max
            )));
        }
        let name = format!("{}-{}", self.config.name, index);
        Ok(KvSinkTask::with_config(
            &name,
            self.sink_config.clone(),
            storage,
        ))
    }
}
