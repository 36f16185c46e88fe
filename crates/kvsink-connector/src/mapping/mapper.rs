//! Record mappers.
//!
//! A mapper turns one `SinkRecord` plus its channel settings into a
//! `MappedRecord`. Both variants share the same key and bin derivation and
//! differ only in how they expose the record's fields:
//!
//! - `MapMapper` reads a keyed container (`Value::Map`)
//! - `StructMapper` reads a schema-described `Value::Struct`
//!
//! Key derivation, in order:
//! 1. namespace and set come from the channel, the user key from the record key
//! 2. `set_field`, if configured, replaces the set with that field's string form
//! 3. `key_field`, if configured, replaces the user key with that field's value
//! 4. the resolved value is coerced into a `UserKey`
//!
//! A configured field that is absent or null fails the record.

use std::borrow::Cow;

use kvsink_core::{Schema, SinkRecord, Struct, Value};

use super::coerce::{coerce, coerce_key, map_key};
use super::registry::RecordShape;
use crate::config::ChannelConfig;
use crate::error::MappingError;
use crate::storage::{Bin, MappedRecord, StorageKey};

/// Converts records of one shape.
pub trait RecordMapper: Send + Sync {
    fn shape(&self) -> RecordShape;

    fn convert(
        &self,
        record: &SinkRecord,
        channel: &ChannelConfig,
    ) -> Result<MappedRecord, MappingError>;
}

/// One field of a record value.
pub struct FieldRef<'a> {
    pub name: Cow<'a, str>,
    pub schema: Option<&'a Schema>,
    pub value: &'a Value,
}

/// Read access to a record value's fields.
pub trait RecordView {
    fn field(&self, name: &str) -> Option<FieldRef<'_>>;

    /// Fields in their natural order.
    fn fields(&self) -> Vec<FieldRef<'_>>;
}

/// View over a keyed container. Scalar keys are used in string form.
pub struct MapView<'a> {
    entries: &'a [(Value, Value)],
    value_schema: Option<&'a Schema>,
}

impl<'a> MapView<'a> {
    pub fn new(entries: &'a [(Value, Value)], value_schema: Option<&'a Schema>) -> Self {
        Self {
            entries,
            value_schema,
        }
    }
}

impl RecordView for MapView<'_> {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| map_key(k).as_deref() == Some(name))
            .map(|(_, v)| FieldRef {
                name: Cow::Owned(name.to_string()),
                schema: self.value_schema,
                value: v,
            })
    }

    fn fields(&self) -> Vec<FieldRef<'_>> {
        let mut fields = Vec::with_capacity(self.entries.len());
        for (k, v) in self.entries {
            let name = match k {
                Value::String(s) => Cow::Borrowed(s.as_str()),
                other => match map_key(other) {
                    Some(s) => Cow::Owned(s),
                    None => {
                        tracing::info!(
                            key_type = other.type_name(),
                            "ignoring record entry with non-scalar key"
                        );
                        continue;
                    }
                },
            };
            fields.push(FieldRef {
                name,
                schema: self.value_schema,
                value: v,
            });
        }
        fields
    }
}

/// View over a struct value.
pub struct StructView<'a> {
    value: &'a Struct,
}

impl<'a> StructView<'a> {
    pub fn new(value: &'a Struct) -> Self {
        Self { value }
    }
}

impl RecordView for StructView<'_> {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        let field = self.value.schema().field(name)?;
        let value = self.value.get(name)?;
        Some(FieldRef {
            name: Cow::Borrowed(field.name()),
            schema: Some(field.schema()),
            value,
        })
    }

    fn fields(&self) -> Vec<FieldRef<'_>> {
        self.value
            .fields()
            .map(|(field, value)| FieldRef {
                name: Cow::Borrowed(field.name()),
                schema: Some(field.schema()),
                value,
            })
            .collect()
    }
}

fn set_name(field: &str, value: &Value) -> Result<String, MappingError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => map_key(other).ok_or_else(|| MappingError::InvalidSetField {
            field: field.to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

/// Shared key and bin derivation.
pub fn map_record(
    record: &SinkRecord,
    channel: &ChannelConfig,
    view: &dyn RecordView,
) -> Result<MappedRecord, MappingError> {
    let mut set = channel.set.clone();
    if let Some(set_field) = &channel.set_field {
        let field = view
            .field(set_field)
            .filter(|f| !f.value.is_null())
            .ok_or_else(|| MappingError::MissingSetField(set_field.clone()))?;
        set = Some(set_name(set_field, field.value)?);
    }

    let user_key = match &channel.key_field {
        Some(key_field) => {
            let field = view
                .field(key_field)
                .filter(|f| !f.value.is_null())
                .ok_or_else(|| MappingError::MissingKeyField(key_field.clone()))?;
            coerce_key(field.value, field.schema.map(|s| s.type_()), channel.key_type)?
        }
        None => {
            let key = record
                .key
                .as_ref()
                .filter(|k| !k.is_null())
                .ok_or(MappingError::MissingKey)?;
            coerce_key(
                key,
                record.key_schema.as_ref().map(|s| s.type_()),
                channel.key_type,
            )?
        }
    };

    let key = StorageKey::new(channel.namespace.clone(), set, user_key);

    let bins = view
        .fields()
        .into_iter()
        .filter_map(|field| {
            let bin_name = channel.bin_name(&field.name)?;
            let value = coerce(&field.name, field.schema, field.value)?;
            Some(Bin::new(bin_name, value))
        })
        .collect();

    Ok(MappedRecord::new(key, bins))
}

/// Mapper for keyed-container record values.
#[derive(Debug, Default)]
pub struct MapMapper;

impl RecordMapper for MapMapper {
    fn shape(&self) -> RecordShape {
        RecordShape::KeyedContainer
    }

    fn convert(
        &self,
        record: &SinkRecord,
        channel: &ChannelConfig,
    ) -> Result<MappedRecord, MappingError> {
        let Value::Map(entries) = &record.value else {
            return Err(MappingError::UnexpectedValue {
                expected: "map",
                found: record.value.type_name().to_string(),
            });
        };
        let value_schema = record.value_schema.as_ref().and_then(|s| s.value_schema());
        map_record(record, channel, &MapView::new(entries, value_schema))
    }
}

/// Mapper for struct record values.
#[derive(Debug, Default)]
pub struct StructMapper;

impl RecordMapper for StructMapper {
    fn shape(&self) -> RecordShape {
        RecordShape::TypedStructure
    }

    fn convert(
        &self,
        record: &SinkRecord,
        channel: &ChannelConfig,
    ) -> Result<MappedRecord, MappingError> {
        let Value::Struct(value) = &record.value else {
            return Err(MappingError::UnexpectedValue {
                expected: "struct",
                found: record.value.type_name().to_string(),
            });
        };
        map_record(record, channel, &StructView::new(value))
    }
}
