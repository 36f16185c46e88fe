//! kvsink connector
//!
//! Sink connector that maps streaming records into a key/value store. Each
//! record becomes a storage key (namespace, optional set, user key) plus a
//! list of named bins, written asynchronously with an in-flight barrier on
//! `flush`.
//!
//! ## Architecture
//!
//! - **Config**: `ConnectorConfig` and the validated `SinkConfig` with per-topic channels.
//! - **Storage**: the `StorageClient` interface, write/client policies, and an in-memory engine.
//! - **Mapping**: value coercion, the keyed-container and typed-structure mappers, and
//!   the `MapperRegistry` that picks one per record.
//! - **Writer**: `AsyncWriter` (in-flight counter, aggregated failures) and `SyncWriter`.
//! - **Task / Connector**: `KvSinkTask` implements `SinkConnector`; `KvSinkConnector`
//!   validates configuration and hands out task configs.
//! - **Runtime**: `ConnectorRuntime` drives tasks with offset commits and redelivery.

pub mod config;
pub mod connector;
pub mod error;
pub mod mapping;
pub mod runtime;
pub mod storage;
pub mod task;
pub mod traits;
pub mod writer;

// Re-export key types at crate root for convenience.
pub use config::{ChannelConfig, ConnectorConfig, ConnectorState, KeyType, SinkConfig, WriteMode};
pub use connector::KvSinkConnector;
pub use error::{ConnectorError, MappingError, Result};
pub use mapping::{MapMapper, MapperRegistry, RecordMapper, RecordShape, StructMapper};
pub use runtime::{ConnectorRuntime, OffsetCommitFn, OffsetMap, RecordSourceFn};
pub use storage::{
    Bin, BinValue, MappedRecord, MemoryCluster, StorageClient, StorageConnector, StorageKey,
    StoreError, UserKey,
};
pub use task::{KvSinkTask, TaskStats};
pub use traits::{SinkConnector, SinkRecord};
pub use writer::{AsyncWriter, RecordWriter, SyncWriter};
