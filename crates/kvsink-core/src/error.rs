//! Error Types for the kvsink record model
//!
//! This module defines the errors raised while building or decoding records.
//!
//! ## Error Categories
//!
//! ### Data Errors
//! - `UnknownField`: A struct was asked for a field its schema does not declare
//! - `TypeMismatch`: A value does not match the type its schema declares
//!
//! ### Decoding Errors
//! - `Json`: A payload is not valid JSON
//! - `InvalidUtf8`: A record key is not valid UTF-8
//!
//! ## Usage
//! All fallible functions in this crate return `Result<T>` which is aliased to
//! `Result<T, Error>`, so `?` propagates through callers.
//!
//! ## Example
//! ```ignore
//! use kvsink_core::{Schema, Struct, Value};
//!
//! let schema = Schema::struct_builder().field("id", Schema::int64()).build();
//! let value = Struct::new(schema).put("id", Value::Int64(7))?;
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Type mismatch for field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid UTF-8 in record key: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
