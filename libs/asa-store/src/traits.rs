//! Trait definitions for the storage and export collaborators

use asa_model::{EntityKind, ExportBatch, ValueRecord};
use async_trait::async_trait;
use errors::Result;

/// Read side of the key-value storage service
///
/// The pipeline never writes source entities; implementations only need to
/// return a consistent snapshot of one collection.
#[async_trait]
pub trait StorageClient: Send + Sync + 'static {
    /// Fetch every value record of `collection` for `tenant_id`
    ///
    /// A collection that does not exist is returned as an empty list, not as
    /// an error. Order is unspecified.
    async fn fetch_all(&self, tenant_id: &str, collection: &str) -> Result<Vec<ValueRecord>>;
}

/// Destination for export batches
///
/// Writing the same batch twice under the same operation id must be
/// harmless. A failed write must not leave a partially written artifact
/// visible under the operation id.
#[async_trait]
pub trait ExportWriter: Send + Sync + 'static {
    async fn write(
        &self,
        tenant_id: &str,
        kind: EntityKind,
        operation_id: &str,
        batch: &ExportBatch,
    ) -> Result<()>;
}
