//! Mapper selection by record shape.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kvsink_core::{SinkRecord, Type, Value};

use super::mapper::{MapMapper, RecordMapper, StructMapper};
use crate::error::{ConnectorError, Result};

/// Record value shapes the connector can map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordShape {
    /// Flat name-to-value container.
    KeyedContainer,
    /// Schema-described struct.
    TypedStructure,
}

impl RecordShape {
    /// Determine the shape from the declared value schema, or from the
    /// value itself when the record is schemaless.
    pub fn of(record: &SinkRecord) -> Result<Self> {
        match &record.value_schema {
            Some(schema) => match schema.type_() {
                Type::Map => Ok(RecordShape::KeyedContainer),
                Type::Struct => Ok(RecordShape::TypedStructure),
                other => Err(ConnectorError::UnsupportedRecordShape(format!(
                    "value schema of type {} on topic '{}'",
                    other, record.topic
                ))),
            },
            None => match &record.value {
                Value::Map(_) => Ok(RecordShape::KeyedContainer),
                Value::Struct(_) => Ok(RecordShape::TypedStructure),
                other => Err(ConnectorError::UnsupportedRecordShape(format!(
                    "schemaless {} value on topic '{}'",
                    other.type_name(),
                    record.topic
                ))),
            },
        }
    }
}

impl fmt::Display for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordShape::KeyedContainer => write!(f, "keyed-container"),
            RecordShape::TypedStructure => write!(f, "typed-structure"),
        }
    }
}

/// Lazily created mappers, one per observed shape.
#[derive(Default)]
pub struct MapperRegistry {
    mappers: HashMap<RecordShape, Arc<dyn RecordMapper>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapper for the record's shape, creating it on first use.
    pub fn get_mapper(&mut self, record: &SinkRecord) -> Result<Arc<dyn RecordMapper>> {
        let shape = RecordShape::of(record)?;
        let mapper = self.mappers.entry(shape).or_insert_with(|| {
            tracing::debug!(shape = %shape, "creating record mapper");
            let mapper: Arc<dyn RecordMapper> = match shape {
                RecordShape::KeyedContainer => Arc::new(MapMapper),
                RecordShape::TypedStructure => Arc::new(StructMapper),
            };
            mapper
        });
        Ok(Arc::clone(mapper))
    }

    /// Number of mappers created so far.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}
