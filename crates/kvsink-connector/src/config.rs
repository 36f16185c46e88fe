//! Configuration types for the kvsink connector.
//!
//! `ConnectorConfig` is the declaration handed over by the host. Its `config`
//! map carries dotted keys which `SinkConfig::from_config_map` validates up
//! front, before any client is built.
//!
//! ## Configuration
//!
//! | Key                           | Description                                        | Default  |
//! |-------------------------------|----------------------------------------------------|----------|
//! | `hosts`                       | Comma-separated `host[:port]` seed list            | required |
//! | `hostname` / `port`           | Single seed host, used when `hosts` is absent      | -/`3000` |
//! | `policy.record_exists_action` | `create_only`, `update`, `update_only`, `replace`, `replace_only` | `update` |
//! | `policy.expiration`           | Record TTL in seconds, `-1` never, `0` namespace default | `0` |
//! | `max_async_commands`          | Maximum concurrent async commands                  | `300`    |
//! | `max_command_action`          | `accept`, `block` or `reject` when at the limit    | `block`  |
//! | `timeout.ms`                  | Per-command timeout, `0` disables                  | `1000`   |
//! | `write.mode`                  | `async` or `sync`                                  | `async`  |
//!
//! Per-topic channel keys are read from `topic.<topic>.<key>`, falling back
//! to `topic.<key>`:
//!
//! | Key          | Description                                              |
//! |--------------|----------------------------------------------------------|
//! | `namespace`  | Target namespace (required)                              |
//! | `set`        | Static set name                                          |
//! | `key_field`  | Value field holding the user key                         |
//! | `set_field`  | Value field holding the set name                         |
//! | `key_type`   | Force the user key to `string`, `integer`, `long` or `bytes` |
//! | `bins`       | `bin1[:field1],bin2[:field2],...` field selection and renaming |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConnectorError, Result};
use crate::storage::{
    parse_hosts, ClientPolicy, Expiration, Host, MaxCommandAction, RecordExistsAction,
    WritePolicy, DEFAULT_PORT,
};

/// Default maximum number of tasks for a connector.
fn default_tasks_max() -> usize {
    1
}

/// Top-level configuration for a connector instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Unique name identifying this connector instance.
    pub name: String,

    /// Fully-qualified class/identifier for the connector implementation.
    pub connector_class: String,

    /// Topics this connector reads from.
    pub topics: Vec<String>,

    /// Maximum number of parallel tasks. Defaults to 1.
    #[serde(default = "default_tasks_max")]
    pub tasks_max: usize,

    /// Dotted key-value settings, see the module docs.
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl ConnectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a connector declaration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// Runtime state of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorState {
    Running,
    Paused,
    Stopped,
    Failed,
}

impl std::fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorState::Running => write!(f, "RUNNING"),
            ConnectorState::Paused => write!(f, "PAUSED"),
            ConnectorState::Stopped => write!(f, "STOPPED"),
            ConnectorState::Failed => write!(f, "FAILED"),
        }
    }
}

/// How the task hands records to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Async,
    Sync,
}

impl WriteMode {
    pub fn from_str_config(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "async" => Ok(WriteMode::Async),
            "sync" => Ok(WriteMode::Sync),
            other => Err(ConnectorError::ConfigError(format!(
                "unknown write mode: '{}'",
                other
            ))),
        }
    }
}

/// Forced representation of the user key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    String,
    Integer,
    Long,
    Bytes,
}

impl KeyType {
    pub fn from_str_config(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "string" => Ok(KeyType::String),
            "integer" => Ok(KeyType::Integer),
            "long" => Ok(KeyType::Long),
            "bytes" => Ok(KeyType::Bytes),
            other => Err(ConnectorError::ConfigError(format!(
                "unknown key type: '{}'",
                other
            ))),
        }
    }
}

/// Parse a `bins` setting into a source-field to bin-name table.
///
/// Each entry is `bin` (field of the same name) or `bin:field`.
pub fn parse_bins(setting: &str) -> Result<HashMap<String, String>> {
    let mut mapping = HashMap::new();
    for entry in setting.split(',') {
        let entry = entry.trim();
        let (bin, field) = match entry.split_once(':') {
            Some((bin, field)) => (bin.trim(), field.trim()),
            None => (entry, entry),
        };
        if bin.is_empty() || field.is_empty() {
            return Err(ConnectorError::ConfigError(format!(
                "invalid bins entry: '{}'",
                entry
            )));
        }
        mapping.insert(field.to_string(), bin.to_string());
    }
    Ok(mapping)
}

/// Mapping settings for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub namespace: String,
    pub set: Option<String>,
    pub key_field: Option<String>,
    pub set_field: Option<String>,
    pub key_type: Option<KeyType>,
    /// Source field name to bin name. When present, unlisted fields are dropped.
    pub bins: Option<HashMap<String, String>>,
}

impl ChannelConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set: None,
            key_field: None,
            set_field: None,
            key_type: None,
            bins: None,
        }
    }

    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = Some(field.into());
        self
    }

    pub fn with_set_field(mut self, field: impl Into<String>) -> Self {
        self.set_field = Some(field.into());
        self
    }

    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = Some(key_type);
        self
    }

    pub fn with_bins(mut self, bins: HashMap<String, String>) -> Self {
        self.bins = Some(bins);
        self
    }

    /// Bin name for a source field, or `None` if the field is not selected.
    pub fn bin_name<'a>(&'a self, field: &'a str) -> Option<&'a str> {
        match &self.bins {
            Some(bins) => bins.get(field).map(|s| s.as_str()),
            None => Some(field),
        }
    }

    /// Read the channel for `topic`, with `topic.<topic>.*` overriding `topic.*`.
    pub fn from_config_map(topic: &str, config: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            config
                .get(&format!("topic.{}.{}", topic, key))
                .or_else(|| config.get(&format!("topic.{}", key)))
                .filter(|v| !v.trim().is_empty())
                .cloned()
        };

        let namespace = get("namespace").ok_or_else(|| {
            ConnectorError::ConfigError(format!(
                "missing required 'topic.namespace' for topic '{}'",
                topic
            ))
        })?;

        let key_type = get("key_type")
            .map(|s| KeyType::from_str_config(&s))
            .transpose()?;

        let bins = get("bins").map(|s| parse_bins(&s)).transpose()?;

        Ok(ChannelConfig {
            namespace,
            set: get("set"),
            key_field: get("key_field"),
            set_field: get("set_field"),
            key_type,
            bins,
        })
    }
}

/// Validated sink settings.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub hosts: Vec<Host>,
    pub client_policy: ClientPolicy,
    pub write_policy: WritePolicy,
    pub write_mode: WriteMode,
    pub channels: HashMap<String, ChannelConfig>,
}

impl SinkConfig {
    /// Validate the connector declaration's settings.
    pub fn from_connector_config(config: &ConnectorConfig) -> Result<Self> {
        Self::from_config_map(&config.topics, &config.config)
    }

    /// Parse and validate a string key-value map for the given topics.
    pub fn from_config_map(topics: &[String], config: &HashMap<String, String>) -> Result<Self> {
        let hosts = match config.get("hosts") {
            Some(hosts) => parse_hosts(hosts)?,
            None => {
                let hostname = config.get("hostname").ok_or_else(|| {
                    ConnectorError::ConfigError("missing required 'hosts'".to_string())
                })?;
                let port = config
                    .get("port")
                    .map(|s| {
                        s.parse::<u16>().map_err(|e| {
                            ConnectorError::ConfigError(format!("invalid port: {}", e))
                        })
                    })
                    .transpose()?
                    .unwrap_or(DEFAULT_PORT);
                if port == 0 {
                    return Err(ConnectorError::ConfigError(
                        "invalid port: must be between 1 and 65535".to_string(),
                    ));
                }
                vec![Host::new(hostname.clone(), port)]
            }
        };

        let record_exists_action = config
            .get("policy.record_exists_action")
            .map(|s| RecordExistsAction::from_str_config(s))
            .transpose()?
            .unwrap_or_default();

        let expiration = config
            .get("policy.expiration")
            .map(|s| {
                s.parse::<i64>().map_err(|e| {
                    ConnectorError::ConfigError(format!("invalid policy.expiration: {}", e))
                })
            })
            .transpose()?
            .map(Expiration::from_seconds)
            .transpose()?
            .unwrap_or_default();

        let max_commands = config
            .get("max_async_commands")
            .map(|s| {
                s.parse::<usize>().map_err(|e| {
                    ConnectorError::ConfigError(format!("invalid max_async_commands: {}", e))
                })
            })
            .transpose()?
            .unwrap_or(300);
        if max_commands == 0 {
            return Err(ConnectorError::ConfigError(
                "invalid max_async_commands: must be positive".to_string(),
            ));
        }

        let max_command_action = config
            .get("max_command_action")
            .map(|s| MaxCommandAction::from_str_config(s))
            .transpose()?
            .unwrap_or_default();

        let timeout_ms = config
            .get("timeout.ms")
            .map(|s| {
                s.parse::<u64>()
                    .map_err(|e| ConnectorError::ConfigError(format!("invalid timeout.ms: {}", e)))
            })
            .transpose()?
            .unwrap_or(1000);

        let write_mode = config
            .get("write.mode")
            .map(|s| WriteMode::from_str_config(s))
            .transpose()?
            .unwrap_or_default();

        let mut channels = HashMap::new();
        for topic in topics {
            channels.insert(topic.clone(), ChannelConfig::from_config_map(topic, config)?);
        }

        Ok(SinkConfig {
            hosts,
            client_policy: ClientPolicy {
                max_commands,
                max_command_action,
            },
            write_policy: WritePolicy {
                record_exists_action,
                expiration,
                timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            },
            write_mode,
            channels,
        })
    }

    pub fn channel(&self, topic: &str) -> Option<&ChannelConfig> {
        self.channels.get(topic)
    }
}
