//! Write and client policies, plus cluster host parsing.

use std::fmt;
use std::time::Duration;

use crate::error::{ConnectorError, Result};

/// Port used for host entries that do not name one.
pub const DEFAULT_PORT: u16 = 3000;

/// How a write treats an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordExistsAction {
    /// Fail if the record exists.
    CreateOnly,
    /// Create or merge bins into the existing record.
    #[default]
    Update,
    /// Merge bins, failing if the record does not exist.
    UpdateOnly,
    /// Create or replace all bins.
    Replace,
    /// Replace all bins, failing if the record does not exist.
    ReplaceOnly,
}

impl RecordExistsAction {
    /// Parse from a string (case-insensitive).
    pub fn from_str_config(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create_only" => Ok(RecordExistsAction::CreateOnly),
            "update" => Ok(RecordExistsAction::Update),
            "update_only" => Ok(RecordExistsAction::UpdateOnly),
            "replace" => Ok(RecordExistsAction::Replace),
            "replace_only" => Ok(RecordExistsAction::ReplaceOnly),
            other => Err(ConnectorError::ConfigError(format!(
                "unknown record exists action: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RecordExistsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordExistsAction::CreateOnly => "create_only",
            RecordExistsAction::Update => "update",
            RecordExistsAction::UpdateOnly => "update_only",
            RecordExistsAction::Replace => "replace",
            RecordExistsAction::ReplaceOnly => "replace_only",
        };
        f.write_str(s)
    }
}

/// Record time-to-live applied on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Use the namespace's configured default TTL.
    #[default]
    NamespaceDefault,
    Never,
    Seconds(u32),
}

impl Expiration {
    /// Map the configured integer: `-1` never, `0` namespace default, `n` seconds.
    pub fn from_seconds(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(Expiration::Never),
            0 => Ok(Expiration::NamespaceDefault),
            n if n > 0 && n <= u32::MAX as i64 => Ok(Expiration::Seconds(n as u32)),
            n => Err(ConnectorError::ConfigError(format!(
                "invalid policy.expiration: {} (expected -1, 0 or a positive number of seconds)",
                n
            ))),
        }
    }
}

/// Policy applied uniformly to every write issued by one writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePolicy {
    pub record_exists_action: RecordExistsAction,
    pub expiration: Expiration,
    /// Per-command timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            record_exists_action: RecordExistsAction::default(),
            expiration: Expiration::default(),
            timeout: Some(Duration::from_millis(1000)),
        }
    }
}

/// What the client does when `max_commands` async commands are already outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxCommandAction {
    /// Issue the command anyway.
    Accept,
    /// Wait for an outstanding command to finish.
    #[default]
    Block,
    /// Fail the command with a rejection.
    Reject,
}

impl MaxCommandAction {
    /// Parse from a string (case-insensitive).
    pub fn from_str_config(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "accept" => Ok(MaxCommandAction::Accept),
            "block" => Ok(MaxCommandAction::Block),
            "reject" => Ok(MaxCommandAction::Reject),
            other => Err(ConnectorError::ConfigError(format!(
                "unknown max command action: '{}'",
                other
            ))),
        }
    }
}

/// Client-wide settings fixed at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPolicy {
    pub max_commands: usize,
    pub max_command_action: MaxCommandAction,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            max_commands: 300,
            max_command_action: MaxCommandAction::default(),
        }
    }
}

/// One cluster seed host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    pub name: String,
    pub port: u16,
}

impl Host {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.port)
    }
}

/// Parse a comma-separated `host[:port]` list.
pub fn parse_hosts(hosts: &str) -> Result<Vec<Host>> {
    let mut parsed = Vec::new();
    for entry in hosts.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(ConnectorError::ConfigError(format!(
                "invalid hosts: empty entry in '{}'",
                hosts
            )));
        }
        let host = match entry.split_once(':') {
            Some((name, port)) => {
                let port = port.parse::<u16>().map_err(|e| {
                    ConnectorError::ConfigError(format!("invalid port in '{}': {}", entry, e))
                })?;
                if name.is_empty() || port == 0 {
                    return Err(ConnectorError::ConfigError(format!(
                        "invalid host entry: '{}'",
                        entry
                    )));
                }
                Host::new(name, port)
            }
            None => Host::new(entry, DEFAULT_PORT),
        };
        parsed.push(host);
    }
    Ok(parsed)
}
