//! Adapters for the domain ports.

pub mod in_memory;
pub mod providers;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
