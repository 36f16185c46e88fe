//! Key/value store boundary.
//!
//! The connector never talks to a concrete store directly. It consumes the
//! `StorageConnector` / `StorageClient` traits from [`client`], with policies
//! from [`policy`] and data types from [`types`]. [`memory`] provides an
//! in-process implementation used by tests and local runs.

pub mod client;
pub mod memory;
pub mod policy;
pub mod types;

pub use client::{StorageClient, StorageConnector, StoreError, WriteListener};
pub use memory::{MemoryClient, MemoryCluster, StoredRecord};
pub use policy::{
    parse_hosts, ClientPolicy, Expiration, Host, MaxCommandAction, RecordExistsAction,
    WritePolicy, DEFAULT_PORT,
};
pub use types::{Bin, BinValue, MappedRecord, StorageKey, UserKey};
