//! Error types for the kvsink connector.
//!
//! `ConnectorError` is what the host sees from a task: configuration and
//! startup failures, fatal record shapes, and aggregated write failures.
//! `MappingError` covers a single record that cannot be turned into a
//! storage key; those records are dropped and the batch continues.

use thiserror::Error;

use crate::storage::StoreError;

/// Errors that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error (file, network, etc).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to connect to the storage cluster.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A record value that no mapper can handle.
    #[error("Unsupported record shape: {0}")]
    UnsupportedRecordShape(String),

    /// Write failures that are expected to succeed on redelivery.
    #[error("Error writing records (retriable): {count} exception(s) occurred while writing records")]
    RetriableWrite {
        count: usize,
        #[source]
        source: StoreError,
    },

    /// Write failures that cannot be recovered by redelivery.
    #[error("Error writing records: {count} exception(s) occurred while writing records")]
    WriteFailed {
        count: usize,
        #[source]
        source: StoreError,
    },

    /// Error in the connector runtime.
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl ConnectorError {
    /// Build the consolidated error for `count` write failures, the first of which was `first`.
    pub fn from_write_failures(count: usize, first: StoreError, retriable: bool) -> Self {
        if retriable {
            ConnectorError::RetriableWrite {
                count,
                source: first,
            }
        } else {
            ConnectorError::WriteFailed {
                count,
                source: first,
            }
        }
    }

    /// Whether the batch that produced this error should be redelivered.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ConnectorError::RetriableWrite { .. })
    }
}

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::SerializationError(e.to_string())
    }
}

impl From<kvsink_core::Error> for ConnectorError {
    fn from(e: kvsink_core::Error) -> Self {
        ConnectorError::SerializationError(e.to_string())
    }
}

/// Why a single record could not be mapped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("record is missing set field '{0}'")]
    MissingSetField(String),

    #[error("record is missing key field '{0}'")]
    MissingKeyField(String),

    #[error("record has no key and no key field is configured")]
    MissingKey,

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("set field '{field}' must be a scalar, found {found}")]
    InvalidSetField { field: String, found: String },

    #[error("unexpected record value: expected {expected}, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: String,
    },
}
