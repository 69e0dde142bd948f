//! In-memory storage and export implementation
//!
//! Uses DashMap for lock-free concurrent access. Intended for tests and dry
//! runs; it also records how often each collaborator method was invoked and
//! can be switched into failure mode.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use asa_model::{EntityKind, ExportBatch, ValueRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use errors::{AsaError, Result};

use crate::keyspace::KeySpace;
use crate::traits::{ExportWriter, StorageClient};

/// In-memory storage with concurrent access support
pub struct MemoryStorage {
    keyspace: KeySpace,
    collections: Arc<DashMap<String, DashMap<String, ValueRecord>>>,
    exports: Arc<DashMap<String, Vec<u8>>>,
    latest: Arc<DashMap<String, String>>,
    fetch_calls: AtomicUsize,
    write_calls: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_write: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            keyspace: KeySpace::default(),
            collections: Arc::new(DashMap::new()),
            exports: Arc::new(DashMap::new()),
            latest: Arc::new(DashMap::new()),
            fetch_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            fail_fetch: AtomicBool::new(false),
            fail_write: AtomicBool::new(false),
        }
    }

    /// Insert or replace a record in a tenant's collection
    pub fn upsert(&self, tenant_id: &str, collection: &str, record: ValueRecord) {
        self.collections
            .entry(self.keyspace.collection_key(tenant_id, collection))
            .or_default()
            .insert(record.key.clone(), record);
    }

    /// Convenience wrapper around [`MemoryStorage::upsert`] for raw payloads
    pub fn insert(&self, tenant_id: &str, collection: &str, key: &str, data: &str) {
        self.upsert(tenant_id, collection, ValueRecord::new(key, data));
    }

    /// Make subsequent `fetch_all` calls fail with a storage error
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `write` calls fail with a storage error
    pub fn set_fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Number of `fetch_all` invocations so far
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `write` invocations so far, successful or not
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Decode a stored export artifact
    pub fn export(
        &self,
        tenant_id: &str,
        kind: EntityKind,
        operation_id: &str,
    ) -> Option<ExportBatch> {
        let key = self.keyspace.export_key(tenant_id, kind, operation_id);
        self.exports
            .get(&key)
            .and_then(|bytes| serde_json::from_slice(bytes.value()).ok())
    }

    /// Operation id of the most recent successful write
    pub fn latest_operation(&self, tenant_id: &str, kind: EntityKind) -> Option<String> {
        self.latest
            .get(&self.keyspace.latest_export_key(tenant_id, kind))
            .map(|v| v.value().clone())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn fetch_all(&self, tenant_id: &str, collection: &str) -> Result<Vec<ValueRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AsaError::storage(format!(
                "simulated fetch failure for {}/{}",
                tenant_id, collection
            )));
        }

        let key = self.keyspace.collection_key(tenant_id, collection);
        Ok(self
            .collections
            .get(&key)
            .map(|c| c.iter().map(|r| r.value().clone()).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExportWriter for MemoryStorage {
    async fn write(
        &self,
        tenant_id: &str,
        kind: EntityKind,
        operation_id: &str,
        batch: &ExportBatch,
    ) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(AsaError::storage(format!(
                "simulated write failure for operation {}",
                operation_id
            )));
        }

        let bytes = batch.to_json_vec()?;
        self.exports.insert(
            self.keyspace.export_key(tenant_id, kind, operation_id),
            bytes,
        );
        self.latest.insert(
            self.keyspace.latest_export_key(tenant_id, kind),
            operation_id.to_string(),
        );
        Ok(())
    }
}
