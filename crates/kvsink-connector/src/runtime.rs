//! Connector runtime for driving sink tasks.
//!
//! The `ConnectorRuntime` spawns each sink as a background tokio task and
//! controls it with pause, resume, and stop signals. Records come from a
//! generic async record source rather than a specific consumer.
//!
//! Each batch is delivered with `put` followed by `flush`. Offsets (the
//! highest offset per topic/partition in the batch) are committed only once
//! both succeed. A retriable failure redelivers the same batch after a
//! backoff; any other failure moves the connector to `Failed` and stops it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ConnectorConfig, ConnectorState};
use crate::error::{ConnectorError, Result};
use crate::traits::{SinkConnector, SinkRecord};

/// Control signals sent from the runtime to a running connector task.
#[derive(Debug)]
enum ControlSignal {
    Pause,
    Resume,
    Stop,
}

/// Handle to a running connector task.
struct ConnectorHandle {
    join_handle: JoinHandle<()>,
    control_tx: mpsc::Sender<ControlSignal>,
    /// Shared with the task loop, which sets `Failed` on fatal errors.
    state: Arc<Mutex<ConnectorState>>,
}

impl ConnectorHandle {
    fn state(&self) -> ConnectorState {
        read_state(&self.state)
    }

    /// Send `signal` and move from `from` to `to`. The state lock is held
    /// throughout so a concurrent `Failed` from the task loop is never
    /// overwritten.
    fn transition(
        &self,
        name: &str,
        from: ConnectorState,
        to: ConnectorState,
        signal: ControlSignal,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != from {
            return Err(ConnectorError::RuntimeError(format!(
                "connector '{}' is not {} (state: {})",
                name,
                from.to_string().to_lowercase(),
                *state
            )));
        }
        self.control_tx.try_send(signal).map_err(|e| {
            ConnectorError::RuntimeError(format!("failed to signal connector '{}': {}", name, e))
        })?;
        *state = to;
        Ok(())
    }
}

fn read_state(state: &Mutex<ConnectorState>) -> ConnectorState {
    *state.lock().unwrap_or_else(|e| e.into_inner())
}

fn write_state(state: &Mutex<ConnectorState>, new_state: ConnectorState) {
    *state.lock().unwrap_or_else(|e| e.into_inner()) = new_state;
}

/// A factory function that produces batches of sink records.
///
/// The runtime calls this function repeatedly to obtain records for the sink.
/// Returning an empty vec signals that no records are currently available.
pub type RecordSourceFn = Box<
    dyn Fn() -> Pin<Box<dyn Future<Output = Result<Vec<SinkRecord>>> + Send>>
        + Send
        + Sync,
>;

/// Highest delivered offset per (topic, partition).
pub type OffsetMap = HashMap<(String, u32), u64>;

/// Called with the offsets of each batch once it has been flushed.
pub type OffsetCommitFn = Box<dyn Fn(&OffsetMap) + Send + Sync>;

/// Highest offset per (topic, partition) in `records`.
pub fn highest_offsets(records: &[SinkRecord]) -> OffsetMap {
    let mut offsets = OffsetMap::new();
    for record in records {
        offsets
            .entry((record.topic.clone(), record.partition))
            .and_modify(|o| *o = (*o).max(record.offset))
            .or_insert(record.offset);
    }
    offsets
}

async fn deliver(sink: &mut dyn SinkConnector, records: &[SinkRecord]) -> Result<()> {
    sink.put(records).await?;
    sink.flush().await
}

/// Flush outstanding writes, then stop the sink. Errors are logged.
async fn shutdown(sink: &mut dyn SinkConnector, connector: &str) {
    if let Err(e) = sink.flush().await {
        tracing::error!(connector = %connector, error = %e, "error flushing on stop");
    }
    if let Err(e) = sink.stop().await {
        tracing::error!(connector = %connector, error = %e, "error stopping connector");
    }
}

/// Runtime that manages the lifecycle of connector instances.
///
/// # Example
///
/// ```ignore
/// use kvsink_connector::runtime::ConnectorRuntime;
///
/// let mut runtime = ConnectorRuntime::new();
/// runtime.start_sink(config, sink, record_source).await?;
/// runtime.pause("my-sink")?;
/// runtime.resume("my-sink")?;
/// runtime.stop("my-sink").await?;
/// ```
pub struct ConnectorRuntime {
    connectors: HashMap<String, ConnectorHandle>,
    poll_interval: Duration,
    retry_backoff: Duration,
}

impl ConnectorRuntime {
    pub fn new() -> Self {
        Self {
            connectors: HashMap::new(),
            poll_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(1000),
        }
    }

    /// Sleep between polls when the source is empty or the connector is paused.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Delay before redelivering a batch after a retriable failure.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Start a sink connector as a background task without offset commits.
    pub async fn start_sink(
        &mut self,
        config: ConnectorConfig,
        sink: Box<dyn SinkConnector>,
        record_source: RecordSourceFn,
    ) -> Result<()> {
        self.start_sink_with_commit(config, sink, record_source, Box::new(|_: &OffsetMap| {}))
            .await
    }

    /// Start a sink connector as a background task.
    ///
    /// The sink is initialized via `start()`, then the task loop polls the
    /// record source and delivers each batch. `commit` receives the batch
    /// offsets after each successful flush.
    pub async fn start_sink_with_commit(
        &mut self,
        config: ConnectorConfig,
        mut sink: Box<dyn SinkConnector>,
        record_source: RecordSourceFn,
        commit: OffsetCommitFn,
    ) -> Result<()> {
        let name = config.name.clone();

        if self.connectors.contains_key(&name) {
            return Err(ConnectorError::RuntimeError(format!(
                "connector '{}' is already running",
                name
            )));
        }

        sink.start().await?;

        let (control_tx, mut control_rx) = mpsc::channel::<ControlSignal>(16);
        let state = Arc::new(Mutex::new(ConnectorState::Running));
        let task_state = state.clone();
        let connector_name = name.clone();
        let poll_interval = self.poll_interval;
        let retry_backoff = self.retry_backoff;

        let join_handle = tokio::spawn(async move {
            let mut paused = false;
            // batch awaiting redelivery after a retriable failure
            let mut pending: Option<Vec<SinkRecord>> = None;

            loop {
                match control_rx.try_recv() {
                    Ok(ControlSignal::Stop) => {
                        tracing::info!(connector = %connector_name, "stopping connector");
                        shutdown(sink.as_mut(), &connector_name).await;
                        write_state(&task_state, ConnectorState::Stopped);
                        break;
                    }
                    Ok(ControlSignal::Pause) => {
                        tracing::info!(connector = %connector_name, "pausing connector");
                        paused = true;
                    }
                    Ok(ControlSignal::Resume) => {
                        tracing::info!(connector = %connector_name, "resuming connector");
                        paused = false;
                    }
                    Err(mpsc::error::TryRecvError::Empty) => {}
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        tracing::warn!(
                            connector = %connector_name,
                            "control channel closed, stopping"
                        );
                        shutdown(sink.as_mut(), &connector_name).await;
                        write_state(&task_state, ConnectorState::Stopped);
                        break;
                    }
                }

                if paused {
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }

                let records = match pending.take() {
                    Some(batch) => batch,
                    None => match record_source().await {
                        Ok(records) => records,
                        Err(e) => {
                            tracing::error!(
                                connector = %connector_name,
                                error = %e,
                                "error polling record source"
                            );
                            tokio::time::sleep(retry_backoff).await;
                            continue;
                        }
                    },
                };

                if records.is_empty() {
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }

                match deliver(sink.as_mut(), &records).await {
                    Ok(()) => {
                        let offsets = highest_offsets(&records);
                        tracing::debug!(
                            connector = %connector_name,
                            records = records.len(),
                            partitions = offsets.len(),
                            "committing offsets"
                        );
                        commit(&offsets);
                    }
                    Err(e) if e.is_retriable() => {
                        tracing::warn!(
                            connector = %connector_name,
                            records = records.len(),
                            error = %e,
                            "retriable error, redelivering batch"
                        );
                        pending = Some(records);
                        tokio::time::sleep(retry_backoff).await;
                    }
                    Err(e) => {
                        tracing::error!(
                            connector = %connector_name,
                            error = %e,
                            "fatal error, failing connector"
                        );
                        write_state(&task_state, ConnectorState::Failed);
                        if let Err(e) = sink.stop().await {
                            tracing::error!(
                                connector = %connector_name,
                                error = %e,
                                "error stopping connector"
                            );
                        }
                        break;
                    }
                }
            }
        });

        self.connectors.insert(
            name,
            ConnectorHandle {
                join_handle,
                control_tx,
                state,
            },
        );

        Ok(())
    }

    /// Send a pause signal to a running connector.
    pub fn pause(&mut self, name: &str) -> Result<()> {
        let handle = self
            .connectors
            .get(name)
            .ok_or_else(|| {
                ConnectorError::RuntimeError(format!("connector '{}' not found", name))
            })?;

        handle.transition(
            name,
            ConnectorState::Running,
            ConnectorState::Paused,
            ControlSignal::Pause,
        )
    }

    /// Send a resume signal to a paused connector.
    pub fn resume(&mut self, name: &str) -> Result<()> {
        let handle = self
            .connectors
            .get(name)
            .ok_or_else(|| {
                ConnectorError::RuntimeError(format!("connector '{}' not found", name))
            })?;

        handle.transition(
            name,
            ConnectorState::Paused,
            ConnectorState::Running,
            ControlSignal::Resume,
        )
    }

    /// Stop a connector and wait for its task to finish.
    ///
    /// A failed connector has already exited; stopping it only removes it.
    /// A task loop that panicked is reported as a `RuntimeError`.
    pub async fn stop(&mut self, name: &str) -> Result<()> {
        let handle = self
            .connectors
            .remove(name)
            .ok_or_else(|| {
                ConnectorError::RuntimeError(format!("connector '{}' not found", name))
            })?;

        // the loop may already have exited, closing the channel
        let _ = handle.control_tx.send(ControlSignal::Stop).await;
        handle.join_handle.await.map_err(|e| {
            ConnectorError::RuntimeError(format!("connector '{}' task failed: {}", name, e))
        })
    }

    /// Return the current state of a connector, or None if not found.
    pub fn state(&self, name: &str) -> Option<ConnectorState> {
        self.connectors.get(name).map(|h| h.state())
    }

    /// Return the names of all managed connectors.
    pub fn connector_names(&self) -> Vec<&str> {
        self.connectors.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ConnectorRuntime {
    fn default() -> Self {
        Self::new()
    }
}
