//! kvsink core record model
//!
//! Schemas, dynamic values and the `SinkRecord` type delivered to sink
//! connectors by the host ingestion framework.

pub mod error;
pub mod record;
pub mod schema;
pub mod value;

pub use error::{Error, Result};
pub use record::SinkRecord;
pub use schema::{Field, Schema, StructSchemaBuilder, Type};
pub use value::{Struct, Value};
