//! Sink Record Data Structure
//!
//! This module defines `SinkRecord` - the unit of data delivered to a sink
//! by the host ingestion framework.
//!
//! ## Structure
//! Each record contains:
//! - **topic / partition / offset**: where the record came from, used for
//!   offset commits after a successful flush
//! - **timestamp**: milliseconds since epoch
//! - **key**: optional native key, with an optional declared schema
//! - **value**: the payload, with an optional declared schema
//!
//! Records without schemas are "schemaless": the connector inspects the
//! runtime shape of `value` instead.
//!
//! ## Example
//! ```ignore
//! let value = Value::map([("a", Value::from("hello"))]);
//! let record = SinkRecord::new("users", Some(Value::from("k1")), value).with_position(0, 42);
//! ```

use crate::error::Result;
use crate::schema::Schema;
use crate::value::{Struct, Value};

/// A record delivered to a sink connector.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    /// Topic the record was consumed from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: u32,
    /// Offset within the partition.
    pub offset: u64,
    /// Timestamp in milliseconds since epoch.
    pub timestamp: u64,
    pub key_schema: Option<Schema>,
    pub key: Option<Value>,
    pub value_schema: Option<Schema>,
    pub value: Value,
}

impl SinkRecord {
    /// Create a schemaless record at partition 0, offset 0.
    pub fn new(topic: impl Into<String>, key: Option<Value>, value: Value) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            timestamp: 0,
            key_schema: None,
            key,
            value_schema: None,
            value,
        }
    }

    /// Create a record whose value is a struct, declaring the struct's schema.
    pub fn from_struct(topic: impl Into<String>, key: Option<Value>, value: Struct) -> Self {
        let schema = value.schema().clone();
        Self::new(topic, key, Value::Struct(value)).with_value_schema(schema)
    }

    pub fn with_position(mut self, partition: u32, offset: u64) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }

    pub fn with_key_schema(mut self, schema: Schema) -> Self {
        self.key_schema = Some(schema);
        self
    }

    pub fn with_value_schema(mut self, schema: Schema) -> Self {
        self.value_schema = Some(schema);
        self
    }

    /// Decode a schemaless record from raw JSON payload bytes.
    ///
    /// The value must be JSON. A key holding a JSON scalar (string, number or
    /// boolean) is decoded; any other key is taken as raw UTF-8 text.
    pub fn from_json(
        topic: impl Into<String>,
        partition: u32,
        offset: u64,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(value)?;
        let key = key.map(decode_key).transpose()?;
        Ok(Self::new(topic, key, Value::from(value)).with_position(partition, offset))
    }
}

fn decode_key(raw: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(raw)?;
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(
            json @ (serde_json::Value::String(_)
            | serde_json::Value::Number(_)
            | serde_json::Value::Bool(_)),
        ) => Ok(Value::from(json)),
        _ => Ok(Value::String(text.to_string())),
    }
}
