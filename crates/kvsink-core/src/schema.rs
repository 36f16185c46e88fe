//! Record Schemas
//!
//! Schemas describe the shape of record keys and values delivered by the host
//! ingestion framework. A schema carries a type tag and, depending on the tag,
//! the nested schemas needed to interpret container values:
//!
//! - **Struct**: ordered, named fields, each with its own schema
//! - **Map**: a key schema and a value schema
//! - **Array**: an element schema (stored as the value schema)
//!
//! ## Example
//! ```ignore
//! let schema = Schema::struct_builder()
//!     .name("user")
//!     .field("id", Schema::int64())
//!     .field("email", Schema::string().optional())
//!     .field("tags", Schema::array(Schema::string()))
//!     .build();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a schema or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    String,
    Bytes,
    Array,
    Map,
    Struct,
}

impl Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Int8 => "int8",
            Type::Int16 => "int16",
            Type::Int32 => "int32",
            Type::Int64 => "int64",
            Type::Float32 => "float32",
            Type::Float64 => "float64",
            Type::Boolean => "boolean",
            Type::String => "string",
            Type::Bytes => "bytes",
            Type::Array => "array",
            Type::Map => "map",
            Type::Struct => "struct",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named field inside a struct schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    index: usize,
    schema: Schema,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the field within its struct.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Schema for a key or value.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    type_: Type,
    optional: bool,
    name: Option<String>,
    fields: Vec<Field>,
    key_schema: Option<Box<Schema>>,
    value_schema: Option<Box<Schema>>,
}

impl Schema {
    /// Create a required schema for a primitive type.
    pub fn new(type_: Type) -> Self {
        Self {
            type_,
            optional: false,
            name: None,
            fields: Vec::new(),
            key_schema: None,
            value_schema: None,
        }
    }

    pub fn int8() -> Self {
        Self::new(Type::Int8)
    }

    pub fn int16() -> Self {
        Self::new(Type::Int16)
    }

    pub fn int32() -> Self {
        Self::new(Type::Int32)
    }

    pub fn int64() -> Self {
        Self::new(Type::Int64)
    }

    pub fn float32() -> Self {
        Self::new(Type::Float32)
    }

    pub fn float64() -> Self {
        Self::new(Type::Float64)
    }

    pub fn boolean() -> Self {
        Self::new(Type::Boolean)
    }

    pub fn string() -> Self {
        Self::new(Type::String)
    }

    pub fn bytes() -> Self {
        Self::new(Type::Bytes)
    }

    /// Array schema with the given element schema.
    pub fn array(element: Schema) -> Self {
        Self {
            value_schema: Some(Box::new(element)),
            ..Self::new(Type::Array)
        }
    }

    /// Map schema with the given key and value schemas.
    pub fn map(key: Schema, value: Schema) -> Self {
        Self {
            key_schema: Some(Box::new(key)),
            value_schema: Some(Box::new(value)),
            ..Self::new(Type::Map)
        }
    }

    /// Start building a struct schema.
    pub fn struct_builder() -> StructSchemaBuilder {
        StructSchemaBuilder::default()
    }

    /// Mark this schema as optional (null values allowed).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn type_(&self) -> Type {
        self.type_
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Struct fields in declaration order. Empty for non-struct schemas.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a struct field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Key schema of a map schema.
    pub fn key_schema(&self) -> Option<&Schema> {
        self.key_schema.as_deref()
    }

    /// Value schema of a map schema, or element schema of an array schema.
    pub fn value_schema(&self) -> Option<&Schema> {
        self.value_schema.as_deref()
    }
}

/// Builder for struct schemas.
#[derive(Debug, Default)]
pub struct StructSchemaBuilder {
    name: Option<String>,
    optional: bool,
    fields: Vec<Field>,
}

impl StructSchemaBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Append a field. A later field with the same name replaces the earlier one.
    pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == name) {
            existing.schema = schema;
            return self;
        }
        let index = self.fields.len();
        self.fields.push(Field {
            name,
            index,
            schema,
        });
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            type_: Type::Struct,
            optional: self.optional,
            name: self.name,
            fields: self.fields,
            key_schema: None,
            value_schema: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_schema() {
        let s = Schema::int32();
        assert_eq!(s.type_(), Type::Int32);
        assert!(!s.is_optional());
        assert!(s.fields().is_empty());
        assert!(s.key_schema().is_none());
    }

    #[test]
    fn test_optional_schema() {
        assert!(Schema::string().optional().is_optional());
    }

    #[test]
    fn test_struct_builder_preserves_order() {
        let s = Schema::struct_builder()
            .name("user")
            .field("id", Schema::int64())
            .field("name", Schema::string())
            .field("score", Schema::float64())
            .build();

        assert_eq!(s.type_(), Type::Struct);
        assert_eq!(s.name(), Some("user"));
        let names: Vec<&str> = s.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["id", "name", "score"]);
        assert_eq!(s.field("score").unwrap().index(), 2);
        assert!(s.field("missing").is_none());
    }

    #[test]
    fn test_struct_builder_duplicate_field_replaces() {
        let s = Schema::struct_builder()
            .field("a", Schema::int32())
            .field("a", Schema::string())
            .build();
        assert_eq!(s.fields().len(), 1);
        assert_eq!(s.field("a").unwrap().schema().type_(), Type::String);
    }

    #[test]
    fn test_container_schemas() {
        let arr = Schema::array(Schema::int16());
        assert_eq!(arr.type_(), Type::Array);
        assert_eq!(arr.value_schema().unwrap().type_(), Type::Int16);

        let map = Schema::map(Schema::string(), Schema::boolean());
        assert_eq!(map.key_schema().unwrap().type_(), Type::String);
        assert_eq!(map.value_schema().unwrap().type_(), Type::Boolean);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(Type::Float32.to_string(), "float32");
        assert_eq!(Type::Struct.to_string(), "struct");
    }

    #[test]
    fn test_type_serde_lowercase() {
        let json = serde_json::to_string(&Type::Int64).unwrap();
        assert_eq!(json, "\"int64\"");
        let back: Type = serde_json::from_str("\"struct\"").unwrap();
        assert_eq!(back, Type::Struct);
    }
}
