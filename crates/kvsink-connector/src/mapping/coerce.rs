//! Type coercion from record values to bin values.
//!
//! When a schema is available its type tag decides the conversion and the
//! value must match it; otherwise the value's own runtime type is used.
//! Leaves that cannot be represented are dropped with a notice. Keys are
//! stricter: a key that cannot be represented fails the record.

use std::collections::BTreeMap;

use bytes::Bytes;
use kvsink_core::{Schema, Type, Value};

use crate::config::KeyType;
use crate::error::MappingError;
use crate::storage::{BinValue, UserKey};

/// Convert one value into a bin value. `None` means the value was dropped.
pub fn coerce(path: &str, schema: Option<&Schema>, value: &Value) -> Option<BinValue> {
    if value.is_null() {
        return Some(BinValue::Null);
    }

    if let Some(declared) = schema.map(|s| s.type_()) {
        if value.type_of() != Some(declared) {
            tracing::info!(
                field = %path,
                expected = %declared,
                found = value.type_name(),
                "ignoring field whose value does not match its schema"
            );
            return None;
        }
    }

    let bin = match value {
        Value::Null => BinValue::Null,
        Value::Boolean(b) => BinValue::Bool(*b),
        Value::Int8(i) => BinValue::Int8(*i),
        Value::Int16(i) => BinValue::Int16(*i),
        Value::Int32(i) => BinValue::Int32(*i),
        Value::Int64(i) => BinValue::Int64(*i),
        Value::Float32(f) => BinValue::Float32(*f),
        Value::Float64(f) => BinValue::Float64(*f),
        Value::String(s) => BinValue::String(s.clone()),
        Value::Bytes(b) => BinValue::Bytes(b.clone()),
        Value::Array(items) => {
            let element = schema.and_then(|s| s.value_schema());
            BinValue::List(
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| coerce(&format!("{}[{}]", path, i), element, item))
                    .collect(),
            )
        }
        Value::Map(entries) => {
            let value_schema = schema.and_then(|s| s.value_schema());
            let mut map = BTreeMap::new();
            for (k, v) in entries {
                let Some(name) = map_key(k) else {
                    tracing::info!(
                        field = %path,
                        key_type = k.type_name(),
                        "ignoring map entry with non-scalar key"
                    );
                    continue;
                };
                if let Some(bin) = coerce(&format!("{}.{}", path, name), value_schema, v) {
                    map.insert(name, bin);
                }
            }
            BinValue::Map(map)
        }
        Value::Struct(s) => BinValue::Map(
            s.fields()
                .filter_map(|(field, v)| {
                    coerce(&format!("{}.{}", path, field.name()), Some(field.schema()), v)
                        .map(|bin| (field.name().to_string(), bin))
                })
                .collect(),
        ),
    };
    Some(bin)
}

/// String form of a scalar map key.
pub(crate) fn map_key(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Int8(i) => Some(i.to_string()),
        Value::Int16(i) => Some(i.to_string()),
        Value::Int32(i) => Some(i.to_string()),
        Value::Int64(i) => Some(i.to_string()),
        Value::Float32(f) => Some(f.to_string()),
        Value::Float64(f) => Some(f.to_string()),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int8(i) => Some(i64::from(*i)),
        Value::Int16(i) => Some(i64::from(*i)),
        Value::Int32(i) => Some(i64::from(*i)),
        Value::Int64(i) => Some(*i),
        _ => None,
    }
}

fn unsupported(value: &Value, wanted: &str) -> MappingError {
    MappingError::UnsupportedKeyType(format!(
        "{} cannot be used as {} key",
        value.type_name(),
        wanted
    ))
}

/// Convert a resolved key value into a user key.
///
/// `declared` is the key's schema type when known; the value must match it.
/// `key_type` forces a representation; without it the value's own type is
/// used, widening 8- and 16-bit integers to 32 bits.
pub fn coerce_key(
    value: &Value,
    declared: Option<Type>,
    key_type: Option<KeyType>,
) -> Result<UserKey, MappingError> {
    if let Some(declared) = declared {
        if value.type_of() != Some(declared) {
            return Err(MappingError::UnsupportedKeyType(format!(
                "{} value declared as {}",
                value.type_name(),
                declared
            )));
        }
    }

    match key_type {
        None => match value {
            Value::String(s) => Ok(UserKey::String(s.clone())),
            Value::Int8(i) => Ok(UserKey::Int32(i32::from(*i))),
            Value::Int16(i) => Ok(UserKey::Int32(i32::from(*i))),
            Value::Int32(i) => Ok(UserKey::Int32(*i)),
            Value::Int64(i) => Ok(UserKey::Int64(*i)),
            Value::Bytes(b) => Ok(UserKey::Bytes(b.clone())),
            other => Err(MappingError::UnsupportedKeyType(other.type_name().to_string())),
        },
        Some(KeyType::String) => match value {
            Value::String(s) => Ok(UserKey::String(s.clone())),
            other => as_i64(other)
                .map(|i| UserKey::String(i.to_string()))
                .ok_or_else(|| unsupported(other, "a string")),
        },
        Some(KeyType::Integer) => {
            let i = as_i64(value).ok_or_else(|| unsupported(value, "an integer"))?;
            i32::try_from(i).map(UserKey::Int32).map_err(|_| {
                MappingError::UnsupportedKeyType(format!("{} does not fit an integer key", i))
            })
        }
        Some(KeyType::Long) => as_i64(value)
            .map(UserKey::Int64)
            .ok_or_else(|| unsupported(value, "a long")),
        Some(KeyType::Bytes) => match value {
            Value::Bytes(b) => Ok(UserKey::Bytes(b.clone())),
            Value::String(s) => Ok(UserKey::Bytes(Bytes::from(s.clone().into_bytes()))),
            other => Err(unsupported(other, "a bytes")),
        },
    }
}
