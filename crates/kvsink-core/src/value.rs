//! Record Values
//!
//! `Value` is the dynamic, self-describing representation of record keys and
//! payloads. Every non-null value knows its own `Type`, which is what the
//! connector falls back to when a record arrives without a declared schema.
//!
//! `Struct` pairs a struct schema with one value per declared field. Values are
//! checked against the field schema on insertion so a built struct always
//! conforms to its schema.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::schema::{Field, Schema, Type};

/// A dynamically typed record value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Bytes),
    Array(Vec<Value>),
    /// Entries in insertion order. Keys are usually strings but any value is allowed.
    Map(Vec<(Value, Value)>),
    Struct(Struct),
}

impl Value {
    /// Runtime type of the value. `None` for `Null`.
    pub fn type_of(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(Type::Boolean),
            Value::Int8(_) => Some(Type::Int8),
            Value::Int16(_) => Some(Type::Int16),
            Value::Int32(_) => Some(Type::Int32),
            Value::Int64(_) => Some(Type::Int64),
            Value::Float32(_) => Some(Type::Float32),
            Value::Float64(_) => Some(Type::Float64),
            Value::String(_) => Some(Type::String),
            Value::Bytes(_) => Some(Type::Bytes),
            Value::Array(_) => Some(Type::Array),
            Value::Map(_) => Some(Type::Map),
            Value::Struct(_) => Some(Type::Struct),
        }
    }

    /// Type name for diagnostics ("null" for `Null`).
    pub fn type_name(&self) -> &'static str {
        self.type_of().map(|t| t.as_str()).unwrap_or("null")
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Build a string-keyed map value, keeping the given entry order.
    pub fn map<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::String(k.into()), v))
                .collect(),
        )
    }

    /// Whether this value may be stored under `schema`.
    ///
    /// Only the top-level type is checked; container contents are not walked.
    pub fn conforms_to(&self, schema: &Schema) -> bool {
        match self.type_of() {
            None => schema.is_optional(),
            Some(t) => t == schema.type_(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

impl From<Struct> for Value {
    fn from(v: Struct) -> Self {
        Value::Struct(v)
    }
}

/// Schemaless JSON conversion.
///
/// Objects become string-keyed maps, integral numbers become `Int64`
/// (falling back to `Float64` when they do not fit), other numbers `Float64`.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int64(i),
                None => Value::Float64(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::map(obj.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

/// A struct value: a struct schema plus one value per declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Struct {
    /// Create a struct with every field set to `Null`.
    pub fn new(schema: Schema) -> Self {
        Self::with_schema(Arc::new(schema))
    }

    /// Create a struct sharing an existing schema.
    pub fn with_schema(schema: Arc<Schema>) -> Self {
        let values = vec![Value::Null; schema.fields().len()];
        Self { schema, values }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Set a field and return the struct, for builder-style construction.
    pub fn put(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Set a field, checking the value against the field's schema.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        if !value.conforms_to(field.schema()) {
            return Err(Error::TypeMismatch {
                field: name.to_string(),
                expected: field.schema().type_().to_string(),
                found: value.type_name().to_string(),
            });
        }
        let index = field.index();
        self.values[index] = value;
        Ok(())
    }

    /// Value of a field, or `None` if the schema has no such field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema
            .field(name)
            .and_then(|f| self.values.get(f.index()))
    }

    /// Fields paired with their values, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields().iter().zip(self.values.iter())
    }
}
