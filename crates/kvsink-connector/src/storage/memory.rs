//! In-memory storage engine.
//!
//! `MemoryCluster` implements `StorageConnector` and hands out `MemoryClient`
//! handles that share one record table. It follows the store's write
//! semantics closely enough to exercise the connector end to end:
//!
//! - record-exists actions (create-only, update, update-only, replace, replace-only)
//! - null bins delete the bin; a record left without bins is removed
//! - a generation counter per record and TTL-based expiry
//! - a bounded number of concurrent async commands with accept/block/reject
//! - per-command timeouts against injected latency
//!
//! Tests can inject failures, latency and unavailability, and read records
//! back with `get`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::client::{StorageClient, StorageConnector, StoreError, WriteListener};
use super::policy::{
    ClientPolicy, Expiration, Host, MaxCommandAction, RecordExistsAction, WritePolicy,
};
use super::types::{Bin, BinValue, MappedRecord, StorageKey};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A record as held by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub bins: BTreeMap<String, BinValue>,
    pub generation: u32,
    pub expires_at: Option<Instant>,
}

impl StoredRecord {
    fn empty() -> Self {
        Self {
            bins: BTreeMap::new(),
            generation: 0,
            expires_at: None,
        }
    }

    pub fn bin(&self, name: &str) -> Option<&BinValue> {
        self.bins.get(name)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct ClusterState {
    records: Mutex<HashMap<StorageKey, StoredRecord>>,
    faults: Mutex<VecDeque<StoreError>>,
    latency: Mutex<Duration>,
    default_ttl: Mutex<Option<Duration>>,
    available: AtomicBool,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    commands: AtomicU64,
}

/// Shared in-memory record table. Cloning yields another handle to the same data.
#[derive(Clone)]
pub struct MemoryCluster {
    state: Arc<ClusterState>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ClusterState {
                records: Mutex::new(HashMap::new()),
                faults: Mutex::new(VecDeque::new()),
                latency: Mutex::new(Duration::ZERO),
                default_ttl: Mutex::new(None),
                available: AtomicBool::new(true),
                active: AtomicUsize::new(0),
                peak_active: AtomicUsize::new(0),
                commands: AtomicU64::new(0),
            }),
        }
    }

    /// TTL applied to writes using `Expiration::NamespaceDefault`. `None` never expires.
    pub fn set_default_ttl(&self, ttl: Option<Duration>) {
        *lock(&self.state.default_ttl) = ttl;
    }

    /// Make the cluster refuse connections and commands.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Delay applied to every command before it executes.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.state.latency) = latency;
    }

    /// Fail the next command that reaches the store with `error`.
    pub fn inject_failure(&self, error: StoreError) {
        lock(&self.state.faults).push_back(error);
    }

    /// Read a record back, ignoring expired ones.
    pub fn get(&self, key: &StorageKey) -> Option<StoredRecord> {
        let now = Instant::now();
        lock(&self.state.records)
            .get(key)
            .filter(|r| !r.is_expired(now))
            .cloned()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        lock(&self.state.records)
            .values()
            .filter(|r| !r.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest number of commands observed executing at once.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_active.load(Ordering::SeqCst)
    }

    /// Commands that reached the store, successful or not.
    pub fn commands_executed(&self) -> u64 {
        self.state.commands.load(Ordering::SeqCst)
    }

    async fn execute(
        &self,
        policy: &WritePolicy,
        key: &StorageKey,
        bins: &[Bin],
    ) -> Result<(), StoreError> {
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_active.fetch_max(active, Ordering::SeqCst);
        let result = self.run_command(policy, key, bins).await;
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        self.state.commands.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn run_command(
        &self,
        policy: &WritePolicy,
        key: &StorageKey,
        bins: &[Bin],
    ) -> Result<(), StoreError> {
        if !self.state.available.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("cluster unavailable".to_string()));
        }

        let latency = *lock(&self.state.latency);
        if !latency.is_zero() {
            match policy.timeout {
                Some(timeout) if latency > timeout => {
                    tokio::time::sleep(timeout).await;
                    return Err(StoreError::Timeout(format!("{}ms", timeout.as_millis())));
                }
                _ => tokio::time::sleep(latency).await,
            }
        }

        if let Some(fault) = lock(&self.state.faults).pop_front() {
            return Err(fault);
        }

        self.apply(policy, key, bins)
    }

    fn apply(
        &self,
        policy: &WritePolicy,
        key: &StorageKey,
        bins: &[Bin],
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let default_ttl = *lock(&self.state.default_ttl);
        let mut records = lock(&self.state.records);

        if records.get(key).is_some_and(|r| r.is_expired(now)) {
            records.remove(key);
        }
        let exists = records.contains_key(key);

        let action = policy.record_exists_action;
        match (action, exists) {
            (RecordExistsAction::CreateOnly, true) => return Err(StoreError::RecordExists),
            (RecordExistsAction::UpdateOnly | RecordExistsAction::ReplaceOnly, false) => {
                return Err(StoreError::RecordNotFound)
            }
            _ => {}
        }

        let record = records.entry(key.clone()).or_insert_with(StoredRecord::empty);
        if matches!(
            action,
            RecordExistsAction::Replace | RecordExistsAction::ReplaceOnly
        ) {
            record.bins.clear();
        }
        for bin in bins {
            if bin.value.is_null() {
                record.bins.remove(&bin.name);
            } else {
                record.bins.insert(bin.name.clone(), bin.value.clone());
            }
        }
        record.generation = record.generation.wrapping_add(1);
        record.expires_at = match policy.expiration {
            Expiration::Never => None,
            Expiration::Seconds(secs) => Some(now + Duration::from_secs(u64::from(secs))),
            Expiration::NamespaceDefault => default_ttl.map(|ttl| now + ttl),
        };

        if record.bins.is_empty() {
            records.remove(key);
        }
        Ok(())
    }
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageConnector for MemoryCluster {
    async fn connect(
        &self,
        hosts: &[Host],
        policy: &ClientPolicy,
    ) -> Result<Arc<dyn StorageClient>, StoreError> {
        if hosts.is_empty() {
            return Err(StoreError::Connection("no seed hosts given".to_string()));
        }
        if !self.state.available.load(Ordering::SeqCst) {
            return Err(StoreError::Connection(format!(
                "unable to reach any of {} seed host(s)",
                hosts.len()
            )));
        }
        Ok(Arc::new(MemoryClient::new(self.clone(), policy.clone())))
    }
}

/// Client handle onto a `MemoryCluster`.
pub struct MemoryClient {
    cluster: MemoryCluster,
    policy: ClientPolicy,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl MemoryClient {
    pub fn new(cluster: MemoryCluster, policy: ClientPolicy) -> Self {
        let slots = policy.max_commands.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            cluster,
            policy,
            permits: Arc::new(Semaphore::new(slots)),
            closed: AtomicBool::new(false),
        }
    }

    async fn command_slot(&self) -> Result<Option<OwnedSemaphorePermit>, StoreError> {
        match self.policy.max_command_action {
            MaxCommandAction::Accept => Ok(None),
            MaxCommandAction::Block => self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| StoreError::ClientClosed),
            MaxCommandAction::Reject => {
                self.permits.clone().try_acquire_owned().map(Some).map_err(|_| {
                    StoreError::CommandRejected(format!(
                        "max async commands ({}) exceeded",
                        self.policy.max_commands
                    ))
                })
            }
        }
    }
}

#[async_trait]
impl StorageClient for MemoryClient {
    async fn put(
        &self,
        policy: &WritePolicy,
        key: &StorageKey,
        bins: &[Bin],
    ) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::ClientClosed);
        }
        self.cluster.execute(policy, key, bins).await
    }

    async fn put_async(
        &self,
        policy: &WritePolicy,
        listener: Arc<dyn WriteListener>,
        record: MappedRecord,
    ) {
        if self.closed.load(Ordering::SeqCst) {
            listener.on_failure(&record.key, StoreError::ClientClosed);
            return;
        }
        let permit = match self.command_slot().await {
            Ok(permit) => permit,
            Err(e) => {
                listener.on_failure(&record.key, e);
                return;
            }
        };

        let cluster = self.cluster.clone();
        let policy = policy.clone();
        tokio::spawn(async move {
            let result = cluster.execute(&policy, &record.key, &record.bins).await;
            drop(permit);
            match result {
                Ok(()) => listener.on_success(&record.key),
                Err(e) => listener.on_failure(&record.key, e),
            }
        });
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.permits.close();
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.cluster.state.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::UserKey;
    use tokio::sync::mpsc;

    fn key(k: &str) -> StorageKey {
        StorageKey::new("ns", Some("s".to_string()), UserKey::String(k.to_string()))
    }

    fn policy(action: RecordExistsAction) -> WritePolicy {
        WritePolicy {
            record_exists_action: action,
            ..WritePolicy::default()
        }
    }

    async fn client(cluster: &MemoryCluster, policy: ClientPolicy) -> Arc<dyn StorageClient> {
        cluster
            .connect(&[Host::new("localhost", 3000)], &policy)
            .await
            .unwrap()
    }

    struct ChannelListener(mpsc::UnboundedSender<Result<StorageKey, StoreError>>);

    impl WriteListener for ChannelListener {
        fn on_success(&self, key: &StorageKey) {
            let _ = self.0.send(Ok(key.clone()));
        }
        fn on_failure(&self, _key: &StorageKey, error: StoreError) {
            let _ = self.0.send(Err(error));
        }
    }

    // ---------------------------------------------------------------
    // Record-exists actions
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_update_merges_bins() {
        let cluster = MemoryCluster::new();
        let c = client(&cluster, ClientPolicy::default()).await;
        let p = policy(RecordExistsAction::Update);
        c.put(&p, &key("a"), &[Bin::new("x", 1i64)]).await.unwrap();
        c.put(&p, &key("a"), &[Bin::new("y", 2i64)]).await.unwrap();

        let rec = cluster.get(&key("a")).unwrap();
        assert_eq!(rec.bin("x"), Some(&BinValue::Int64(1)));
        assert_eq!(rec.bin("y"), Some(&BinValue::Int64(2)));
        assert_eq!(rec.generation, 2);
    }

    #[tokio::test]
    async fn test_replace_drops_old_bins() {
        let cluster = MemoryCluster::new();
        let c = client(&cluster, ClientPolicy::default()).await;
        c.put(&policy(RecordExistsAction::Update), &key("a"), &[Bin::new("x", 1i64)])
            .await
            .unwrap();
        c.put(&policy(RecordExistsAction::Replace), &key("a"), &[Bin::new("y", 2i64)])
            .await
            .unwrap();

        let rec = cluster.get(&key("a")).unwrap();
        assert!(rec.bin("x").is_none());
        assert_eq!(rec.bin("y"), Some(&BinValue::Int64(2)));
    }

    #[tokio::test]
    async fn test_create_only_rejects_existing() {
        let cluster = MemoryCluster::new();
        let c = client(&cluster, ClientPolicy::default()).await;
        let p = policy(RecordExistsAction::CreateOnly);
        c.put(&p, &key("a"), &[Bin::new("x", 1i64)]).await.unwrap();
        let err = c.put(&p, &key("a"), &[Bin::new("x", 2i64)]).await.unwrap_err();
        assert_eq!(err, StoreError::RecordExists);
        assert_eq!(cluster.get(&key("a")).unwrap().bin("x"), Some(&BinValue::Int64(1)));
    }

    #[tokio::test]
    async fn test_only_actions_require_existing() {
        let cluster = MemoryCluster::new();
        let c = client(&cluster, ClientPolicy::default()).await;
        for action in [RecordExistsAction::UpdateOnly, RecordExistsAction::ReplaceOnly] {
            let err = c
                .put(&policy(action), &key("missing"), &[Bin::new("x", 1i64)])
                .await
                .unwrap_err();
            assert_eq!(err, StoreError::RecordNotFound);
        }
        assert!(cluster.is_empty());
    }

    #[tokio::test]
    async fn test_null_bin_deletes() {
        let cluster = MemoryCluster::new();
        let c = client(&cluster, ClientPolicy::default()).await;
        let p = policy(RecordExistsAction::Update);
        c.put(&p, &key("a"), &[Bin::new("x", 1i64), Bin::new("y", 2i64)])
            .await
            .unwrap();
        c.put(&p, &key("a"), &[Bin::new("x", BinValue::Null)]).await.unwrap();
        let rec = cluster.get(&key("a")).unwrap();
        assert!(rec.bin("x").is_none());

        c.put(&p, &key("a"), &[Bin::new("y", BinValue::Null)]).await.unwrap();
        assert!(cluster.get(&key("a")).is_none());
    }

    // ---------------------------------------------------------------
    // Expiry
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_namespace_default_ttl_expires() {
        let cluster = MemoryCluster::new();
        cluster.set_default_ttl(Some(Duration::from_millis(20)));
        let c = client(&cluster, ClientPolicy::default()).await;
        c.put(&policy(RecordExistsAction::Update), &key("a"), &[Bin::new("x", 1i64)])
            .await
            .unwrap();
        assert!(cluster.get(&key("a")).is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cluster.get(&key("a")).is_none());
        assert_eq!(cluster.len(), 0);
    }

    #[tokio::test]
    async fn test_never_expire_overrides_default() {
        let cluster = MemoryCluster::new();
        cluster.set_default_ttl(Some(Duration::from_millis(1)));
        let c = client(&cluster, ClientPolicy::default()).await;
        let p = WritePolicy {
            expiration: Expiration::Never,
            ..WritePolicy::default()
        };
        c.put(&p, &key("a"), &[Bin::new("x", 1i64)]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cluster.get(&key("a")).unwrap().expires_at.is_none());
    }

    // ---------------------------------------------------------------
    // Faults, latency, availability
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let cluster = MemoryCluster::new();
        cluster.inject_failure(StoreError::Server("disk full".into()));
        let c = client(&cluster, ClientPolicy::default()).await;
        let p = WritePolicy::default();
        assert!(c.put(&p, &key("a"), &[Bin::new("x", 1i64)]).await.is_err());
        assert!(c.put(&p, &key("a"), &[Bin::new("x", 1i64)]).await.is_ok());
        assert_eq!(cluster.commands_executed(), 2);
    }

    #[tokio::test]
    async fn test_latency_beyond_timeout() {
        let cluster = MemoryCluster::new();
        cluster.set_latency(Duration::from_millis(50));
        let c = client(&cluster, ClientPolicy::default()).await;
        let p = WritePolicy {
            timeout: Some(Duration::from_millis(5)),
            ..WritePolicy::default()
        };
        let err = c.put(&p, &key("a"), &[Bin::new("x", 1i64)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(err.is_retriable());
        assert!(cluster.get(&key("a")).is_none());
    }

    #[tokio::test]
    async fn test_unavailable_cluster() {
        let cluster = MemoryCluster::new();
        cluster.set_available(false);
        let result = cluster
            .connect(&[Host::new("h", 3000)], &ClientPolicy::default())
            .await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }

    #[tokio::test]
    async fn test_connect_without_hosts() {
        let cluster = MemoryCluster::new();
        assert!(cluster.connect(&[], &ClientPolicy::default()).await.is_err());
    }

    // ---------------------------------------------------------------
    // Async commands
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_put_async_reports_success() {
        let cluster = MemoryCluster::new();
        let c = client(&cluster, ClientPolicy::default()).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn WriteListener> = Arc::new(ChannelListener(tx));
        let record = MappedRecord::new(key("a"), vec![Bin::new("x", "hello")]);
        c.put_async(&WritePolicy::default(), listener, record).await;

        assert_eq!(rx.recv().await.unwrap(), Ok(key("a")));
        assert_eq!(
            cluster.get(&key("a")).unwrap().bin("x"),
            Some(&BinValue::String("hello".into()))
        );
    }

    #[tokio::test]
    async fn test_put_async_reject_when_full() {
        let cluster = MemoryCluster::new();
        cluster.set_latency(Duration::from_millis(50));
        let c = client(
            &cluster,
            ClientPolicy {
                max_commands: 1,
                max_command_action: MaxCommandAction::Reject,
            },
        )
        .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn WriteListener> = Arc::new(ChannelListener(tx));
        let p = WritePolicy {
            timeout: None,
            ..WritePolicy::default()
        };
        c.put_async(&p, listener.clone(), MappedRecord::new(key("a"), vec![Bin::new("x", 1i64)]))
            .await;
        c.put_async(&p, listener, MappedRecord::new(key("b"), vec![Bin::new("x", 1i64)]))
            .await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, Err(StoreError::CommandRejected(_))));
        assert_eq!(rx.recv().await.unwrap(), Ok(key("a")));
    }

    #[tokio::test]
    async fn test_put_async_block_bounds_concurrency() {
        let cluster = MemoryCluster::new();
        cluster.set_latency(Duration::from_millis(5));
        let c = client(
            &cluster,
            ClientPolicy {
                max_commands: 2,
                max_command_action: MaxCommandAction::Block,
            },
        )
        .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn WriteListener> = Arc::new(ChannelListener(tx));
        for i in 0..10 {
            let record = MappedRecord::new(key(&i.to_string()), vec![Bin::new("i", i as i64)]);
            c.put_async(&WritePolicy::default(), listener.clone(), record).await;
        }
        for _ in 0..10 {
            assert!(rx.recv().await.unwrap().is_ok());
        }
        assert_eq!(cluster.len(), 10);
        assert!(cluster.peak_in_flight() <= 2);
    }

    #[tokio::test]
    async fn test_closed_client_fails_commands() {
        let cluster = MemoryCluster::new();
        let c = client(&cluster, ClientPolicy::default()).await;
        c.close();
        assert!(!c.is_connected());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn WriteListener> = Arc::new(ChannelListener(tx));
        c.put_async(&WritePolicy::default(), listener, MappedRecord::new(key("a"), vec![]))
            .await;
        assert_eq!(rx.recv().await.unwrap(), Err(StoreError::ClientClosed));
        assert_eq!(
            c.put(&WritePolicy::default(), &key("a"), &[]).await,
            Err(StoreError::ClientClosed)
        );
    }
}
