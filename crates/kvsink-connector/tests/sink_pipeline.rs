//! End-to-end tests: connector config → task → mapper → writer → in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kvsink_connector::{
    BinValue, ConnectorConfig, ConnectorError, KvSinkConnector, KvSinkTask, MemoryCluster,
    SinkConnector, SinkRecord, StorageKey, StoreError, UserKey,
};
use kvsink_core::{Schema, Struct, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn connector_config(extra: &[(&str, &str)]) -> ConnectorConfig {
    let mut config: HashMap<String, String> = [
        ("hosts", "db1,db2:3100"),
        ("topic.namespace", "ns"),
        ("topic.set", "s"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        config.insert(k.to_string(), v.to_string());
    }
    ConnectorConfig {
        name: "kv".to_string(),
        connector_class: "kvsink".to_string(),
        topics: vec!["events".to_string(), "users".to_string()],
        tasks_max: 1,
        config,
    }
}

async fn started_task(cluster: &MemoryCluster, extra: &[(&str, &str)]) -> KvSinkTask {
    init_tracing();
    let connector = KvSinkConnector::new(connector_config(extra)).unwrap();
    let mut task = connector.create_task(0, Arc::new(cluster.clone())).unwrap();
    task.start().await.unwrap();
    task
}

fn key(set: &str, user_key: UserKey) -> StorageKey {
    StorageKey::new("ns", Some(set.to_string()), user_key)
}

fn event(k: &str, entries: Vec<(&str, Value)>) -> SinkRecord {
    SinkRecord::new("events", Some(Value::from(k)), Value::map(entries))
}

// ---------------------------------------------------------------
// Keyed containers
// ---------------------------------------------------------------

#[tokio::test]
async fn native_key_record_is_written() {
    let cluster = MemoryCluster::new();
    let mut task = started_task(&cluster, &[]).await;

    task.put(&[event("k1", vec![("a", Value::from("hello"))])])
        .await
        .unwrap();
    task.flush().await.unwrap();

    let stored = cluster.get(&key("s", UserKey::String("k1".into()))).unwrap();
    assert_eq!(stored.bins.len(), 1);
    assert_eq!(stored.bin("a"), Some(&BinValue::String("hello".into())));
    task.stop().await.unwrap();
}

#[tokio::test]
async fn key_field_becomes_integer_key() {
    let cluster = MemoryCluster::new();
    let mut task = started_task(&cluster, &[("topic.key_field", "id")]).await;

    let record = SinkRecord::from_json("events", 0, 0, None, br#"{"id": 42, "x": 1}"#).unwrap();
    task.put(&[record]).await.unwrap();
    task.flush().await.unwrap();

    let stored = cluster.get(&key("s", UserKey::Int64(42))).unwrap();
    assert_eq!(stored.bin("id"), Some(&BinValue::Int64(42)));
    assert_eq!(stored.bin("x"), Some(&BinValue::Int64(1)));
}

#[tokio::test]
async fn json_records_with_nested_values() {
    let cluster = MemoryCluster::new();
    let mut task = started_task(&cluster, &[]).await;

    let record = SinkRecord::from_json(
        "events",
        0,
        7,
        Some(b"order-1"),
        br#"{"items": [1, 2], "ship": {"city": "Oslo"}, "note": null}"#,
    )
    .unwrap();
    task.put(&[record]).await.unwrap();
    task.flush().await.unwrap();

    let stored = cluster
        .get(&key("s", UserKey::String("order-1".into())))
        .unwrap();
    assert_eq!(
        stored.bin("items"),
        Some(&BinValue::List(vec![BinValue::Int64(1), BinValue::Int64(2)]))
    );
    match stored.bin("ship") {
        Some(BinValue::Map(m)) => assert_eq!(m.get("city"), Some(&BinValue::String("Oslo".into()))),
        other => panic!("expected map bin, got {:?}", other),
    }
    // null bins are not stored
    assert!(stored.bin("note").is_none());
}

#[tokio::test]
async fn per_topic_overrides_apply() {
    let cluster = MemoryCluster::new();
    let mut task = started_task(
        &cluster,
        &[
            ("topic.users.set", "people"),
            ("topic.users.key_field", "uid"),
            ("topic.users.key_type", "string"),
            ("topic.users.bins", "uid,display:name"),
        ],
    )
    .await;

    let user = SinkRecord::new(
        "users",
        None,
        Value::map([
            ("uid", Value::Int64(5)),
            ("name", Value::from("ada")),
            ("secret", Value::from("x")),
        ]),
    );
    task.put(&[user, event("e1", vec![("a", Value::Int64(1))])])
        .await
        .unwrap();
    task.flush().await.unwrap();

    let stored = cluster.get(&key("people", UserKey::String("5".into()))).unwrap();
    assert_eq!(stored.bin("display"), Some(&BinValue::String("ada".into())));
    assert_eq!(stored.bin("uid"), Some(&BinValue::Int64(5)));
    assert!(stored.bin("secret").is_none());
    assert!(cluster.get(&key("s", UserKey::String("e1".into()))).is_some());
}

// ---------------------------------------------------------------
// Typed structures
// ---------------------------------------------------------------

#[tokio::test]
async fn struct_records_use_set_field() {
    let cluster = MemoryCluster::new();
    let mut task = started_task(
        &cluster,
        &[("topic.key_field", "id"), ("topic.set_field", "region")],
    )
    .await;

    let schema = Schema::struct_builder()
        .name("user")
        .field("id", Schema::int32())
        .field("region", Schema::string())
        .field("score", Schema::float64().optional())
        .build();
    let value = Struct::new(schema)
        .put("id", 9i32)
        .unwrap()
        .put("region", "eu")
        .unwrap();
    task.put(&[SinkRecord::from_struct("users", None, value)])
        .await
        .unwrap();
    task.flush().await.unwrap();

    let stored = cluster.get(&key("eu", UserKey::Int32(9))).unwrap();
    assert_eq!(stored.bin("id"), Some(&BinValue::Int32(9)));
    assert_eq!(stored.bin("region"), Some(&BinValue::String("eu".into())));
    assert_eq!(task.stats().written, 1);
}

// ---------------------------------------------------------------
// Failures
// ---------------------------------------------------------------

#[tokio::test]
async fn one_timeout_raises_retriable_and_clears() {
    let cluster = MemoryCluster::new();
    cluster.inject_failure(StoreError::Timeout("1000ms".into()));
    let mut task = started_task(&cluster, &[]).await;

    task.put(&[
        event("a", vec![("x", Value::Int64(1))]),
        event("b", vec![("x", Value::Int64(2))]),
    ])
    .await
    .unwrap();

    let err = task.flush().await.unwrap_err();
    assert!(err.is_retriable());
    assert!(matches!(err, ConnectorError::RetriableWrite { count: 1, .. }));
    assert!(err.to_string().contains("1 exception(s)"));
    assert_eq!(cluster.len(), 1);

    task.flush().await.unwrap();
}

#[tokio::test]
async fn create_only_conflict_is_not_retriable() {
    let cluster = MemoryCluster::new();
    let mut task = started_task(&cluster, &[("policy.record_exists_action", "create_only")]).await;

    task.put(&[event("a", vec![("x", Value::Int64(1))])])
        .await
        .unwrap();
    task.flush().await.unwrap();

    task.put(&[event("a", vec![("x", Value::Int64(2))])])
        .await
        .unwrap();
    let err = task.flush().await.unwrap_err();
    assert!(!err.is_retriable());

    let stored = cluster.get(&key("s", UserKey::String("a".into()))).unwrap();
    assert_eq!(stored.bin("x"), Some(&BinValue::Int64(1)));
}

#[tokio::test]
async fn bounded_concurrency_loses_nothing() {
    let cluster = MemoryCluster::new();
    cluster.set_latency(Duration::from_millis(1));
    let mut task = started_task(
        &cluster,
        &[("max_async_commands", "3"), ("max_command_action", "block")],
    )
    .await;

    let records: Vec<SinkRecord> = (0..40)
        .map(|i| event(&format!("k{}", i), vec![("i", Value::Int64(i))]))
        .collect();
    task.put(&records).await.unwrap();
    task.flush().await.unwrap();

    assert_eq!(cluster.len(), 40);
    assert!(cluster.peak_in_flight() <= 3);
    assert_eq!(task.stats().written, 40);
}

#[tokio::test]
async fn sync_mode_writes_before_put_returns() {
    let cluster = MemoryCluster::new();
    let mut task = started_task(&cluster, &[("write.mode", "sync")]).await;

    task.put(&[event("a", vec![("x", Value::Int64(1))])])
        .await
        .unwrap();
    assert_eq!(cluster.len(), 1);
    task.flush().await.unwrap();
}

#[tokio::test]
async fn unreachable_cluster_fails_start() {
    init_tracing();
    let cluster = MemoryCluster::new();
    cluster.set_available(false);
    let connector = KvSinkConnector::new(connector_config(&[])).unwrap();
    let mut task = connector.create_task(0, Arc::new(cluster)).unwrap();
    let err = task.start().await.unwrap_err();
    assert!(matches!(err, ConnectorError::ConnectionError(_)));
}

#[test]
fn invalid_config_rejected_before_connecting() {
    let err = KvSinkConnector::new(connector_config(&[("max_command_action", "drop")]))
        .err()
        .unwrap();
    assert!(matches!(err, ConnectorError::ConfigError(_)));
}
