//! ASA Store - storage and export adapters
//!
//! The conversion pipeline only sees two narrow interfaces:
//!
//! - **StorageClient**: read every value record of a tenant's collection
//! - **ExportWriter**: persist one export batch under its operation id
//!
//! Implementations:
//! - `RedisStorage`: production Redis backend (both interfaces)
//! - `MemoryStorage`: in-memory backend for tests and dry runs (both)
//! - `FileExportWriter`: export artifacts as JSON files on disk

pub mod file_writer;
pub mod keyspace;
pub mod memory_impl;
pub mod traits;

#[cfg(feature = "redis-backend")]
pub mod redis_impl;

pub use file_writer::FileExportWriter;
pub use keyspace::{validate_tenant_id, KeySpace};
pub use memory_impl::MemoryStorage;
pub use traits::{ExportWriter, StorageClient};

#[cfg(feature = "redis-backend")]
pub use redis_impl::RedisStorage;
