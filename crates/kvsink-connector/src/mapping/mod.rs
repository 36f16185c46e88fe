//! Record-to-storage mapping.
//!
//! [`registry`] picks a mapper by record shape, [`mapper`] derives the
//! storage key and bins, and [`coerce`] converts individual values.

pub mod coerce;
pub mod mapper;
pub mod registry;

pub use coerce::{coerce, coerce_key};
pub use mapper::{map_record, MapMapper, RecordMapper, RecordView, StructMapper};
pub use registry::{MapperRegistry, RecordShape};
