//! Storage-side data types: keys, bins and mapped records.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// User key portion of a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserKey {
    String(String),
    Int32(i32),
    Int64(i64),
    Bytes(Bytes),
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::String(s) => write!(f, "{:?}", s),
            UserKey::Int32(i) => write!(f, "{}", i),
            UserKey::Int64(i) => write!(f, "{}", i),
            UserKey::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Fully qualified record address in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub namespace: String,
    pub set: Option<String>,
    pub user_key: UserKey,
}

impl StorageKey {
    pub fn new(namespace: impl Into<String>, set: Option<String>, user_key: UserKey) -> Self {
        Self {
            namespace: namespace.into(),
            set,
            user_key,
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.namespace,
            self.set.as_deref().unwrap_or(""),
            self.user_key
        )
    }
}

/// Value of a single bin.
#[derive(Debug, Clone, PartialEq)]
pub enum BinValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Bytes),
    List(Vec<BinValue>),
    Map(BTreeMap<String, BinValue>),
}

impl BinValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            BinValue::Null => "null",
            BinValue::Bool(_) => "boolean",
            BinValue::Int8(_) => "int8",
            BinValue::Int16(_) => "int16",
            BinValue::Int32(_) => "int32",
            BinValue::Int64(_) => "int64",
            BinValue::Float32(_) => "float32",
            BinValue::Float64(_) => "float64",
            BinValue::String(_) => "string",
            BinValue::Bytes(_) => "bytes",
            BinValue::List(_) => "list",
            BinValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BinValue::Null)
    }
}

impl From<&str> for BinValue {
    fn from(v: &str) -> Self {
        BinValue::String(v.to_string())
    }
}

impl From<i64> for BinValue {
    fn from(v: i64) -> Self {
        BinValue::Int64(v)
    }
}

impl From<bool> for BinValue {
    fn from(v: bool) -> Self {
        BinValue::Bool(v)
    }
}

/// A named bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub name: String,
    pub value: BinValue,
}

impl Bin {
    pub fn new(name: impl Into<String>, value: impl Into<BinValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Output of the mapping stage: a key plus its bins.
///
/// Bins keep source order. Duplicate names are allowed and resolved by the
/// store (last write wins).
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRecord {
    pub key: StorageKey,
    pub bins: Vec<Bin>,
}

impl MappedRecord {
    pub fn new(key: StorageKey, bins: Vec<Bin>) -> Self {
        Self { key, bins }
    }

    pub fn bin(&self, name: &str) -> Option<&BinValue> {
        self.bins.iter().rev().find(|b| b.name == name).map(|b| &b.value)
    }
}
