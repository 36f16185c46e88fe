//! Connector traits.
//!
//! Defines the `SinkConnector` trait driven by the runtime. Records are the
//! typed `SinkRecord` from `kvsink-core`, re-exported here for convenience.

use async_trait::async_trait;

use crate::error::Result;

pub use kvsink_core::SinkRecord;

/// Trait that all sink connectors must implement.
///
/// The runtime calls `put` with each batch and `flush` at checkpoint
/// boundaries; offsets are committed only after `flush` succeeds.
#[async_trait]
pub trait SinkConnector: Send + Sync {
    /// Initialize the connector and establish connections.
    async fn start(&mut self) -> Result<()>;

    /// Accept a batch of records for writing.
    ///
    /// Implementations may defer completion of the actual writes until
    /// [`flush`](SinkConnector::flush) is called.
    async fn put(&mut self, records: &[SinkRecord]) -> Result<()>;

    /// Wait until every record accepted by `put` has been written.
    async fn flush(&mut self) -> Result<()>;

    /// Shut down the connector and release its connections.
    async fn stop(&mut self) -> Result<()>;

    /// Return the unique name of this connector instance.
    fn name(&self) -> &str;
}
