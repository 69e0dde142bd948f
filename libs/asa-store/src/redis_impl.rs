//! Redis implementation of the storage and export traits

use asa_model::{EntityKind, ExportBatch, ValueRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::redis::{RedisClient, RedisConfig};
use errors::{AsaError, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::keyspace::KeySpace;
use crate::traits::{ExportWriter, StorageClient};

/// Hash field value as stored in a collection hash
#[derive(Debug, Deserialize)]
struct StoredValue {
    #[serde(default)]
    data: Option<String>,
    #[serde(rename = "eTag", default)]
    etag: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Redis-backed storage client and export writer
pub struct RedisStorage {
    client: RedisClient,
    keyspace: KeySpace,
}

impl RedisStorage {
    /// Create a new storage from URL and pool size
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let config = RedisConfig {
            max_connections,
            ..RedisConfig::from_url(url)
        };
        let client = RedisClient::with_config(config)
            .await
            .map_err(|e| AsaError::storage(format!("{:#}", e)))?;
        Ok(Self {
            client,
            keyspace: KeySpace::default(),
        })
    }

    /// Verify the server is reachable
    pub async fn ping(&self) -> Result<()> {
        self.client
            .ping()
            .await
            .map_err(|e| AsaError::storage(format!("{:#}", e)))
    }
}

/// Turn a raw hash entry into a value record
///
/// Entries written by other tools may hold the bare payload instead of the
/// JSON envelope; those are passed through as the record's data. Values
/// that are not UTF-8 become undecodable records so the parser fails just
/// that item.
fn decode_entry(field: Vec<u8>, raw: Vec<u8>) -> ValueRecord {
    let key = String::from_utf8_lossy(&field).into_owned();
    let raw = match String::from_utf8(raw) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Hash entry {} is not valid UTF-8: {}", key, e);
            return ValueRecord::undecodable(key, e.to_string());
        },
    };

    if looks_like_envelope(&raw) {
        if let Ok(stored) = serde_json::from_str::<StoredValue>(&raw) {
            return ValueRecord {
                key,
                data: stored.data,
                etag: stored.etag,
                timestamp: stored.timestamp.unwrap_or_else(Utc::now),
                decode_error: None,
            };
        }
    }

    ValueRecord {
        key,
        data: Some(raw),
        etag: String::new(),
        timestamp: Utc::now(),
        decode_error: None,
    }
}

/// Artifact and `latest` pointer for one export, in write order
fn export_entries(
    keyspace: &KeySpace,
    tenant_id: &str,
    kind: EntityKind,
    operation_id: &str,
    batch: &ExportBatch,
) -> Result<Vec<(String, String)>> {
    // Same pretty layout as the other writers
    let payload = serde_json::to_string_pretty(batch)?;
    Ok(vec![
        (keyspace.export_key(tenant_id, kind, operation_id), payload),
        (
            keyspace.latest_export_key(tenant_id, kind),
            operation_id.to_string(),
        ),
    ])
}

fn looks_like_envelope(raw: &str) -> bool {
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw)
        .map(|m| m.contains_key("data") || m.contains_key("eTag"))
        .unwrap_or(false)
}

#[async_trait]
impl StorageClient for RedisStorage {
    async fn fetch_all(&self, tenant_id: &str, collection: &str) -> Result<Vec<ValueRecord>> {
        let key = self.keyspace.collection_key(tenant_id, collection);
        let entries = self
            .client
            .hgetall_raw(&key)
            .await
            .map_err(|e| AsaError::storage(format!("{:#}", e)))?;

        debug!("Fetched {} entries from {}", entries.len(), key);
        Ok(entries
            .into_iter()
            .map(|(field, raw)| decode_entry(field, raw))
            .collect())
    }
}

#[async_trait]
impl ExportWriter for RedisStorage {
    async fn write(
        &self,
        tenant_id: &str,
        kind: EntityKind,
        operation_id: &str,
        batch: &ExportBatch,
    ) -> Result<()> {
        // Artifact and pointer land together or not at all
        let entries = export_entries(&self.keyspace, tenant_id, kind, operation_id, batch)?;
        self.client
            .set_many_atomic(&entries)
            .await
            .map_err(|e| AsaError::storage(format!("{:#}", e)))
    }
}
