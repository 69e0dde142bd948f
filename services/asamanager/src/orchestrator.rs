//! Conversion orchestrator
//!
//! Drives one Convert call: fetch the tenant's collection, turn each value
//! record into an export record (resolving device groups through the
//! registry), tally per-item outcomes and hand the batch to the export
//! writer in a single call.
//!
//! Per-item failures are tallied and never abort the batch. Only tenant
//! validation, empty input, storage and write failures (and cancellation)
//! end a conversion early, and none of them write anything.

use std::sync::Arc;

use asa_model::{
    parse, ConversionCounts, ConversionOperation, ConversionReport, DeviceGroupEntity,
    DeviceGroupExportRecord, Entity, EntityKind, ExportBatch, ExportRecord, ItemError,
    ItemFailure, RuleExportRecord, SkipReason, SkippedItem, ValueRecord,
};
use asa_store::{validate_tenant_id, ExportWriter, StorageClient};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{CollectionNames, ConversionConfig, RecordOrder};
use crate::device_registry::DeviceRegistry;
use crate::error::{ConversionStage, ConvertError};

/// Outcome of a single value record
#[derive(Debug)]
enum ItemOutcome {
    Converted(ExportRecord),
    Skipped(SkippedItem),
    Failed(ItemFailure),
    /// Cancellation arrived before the item was picked up
    NotStarted,
}

/// Converts stored entities into export batches
pub struct ConversionOrchestrator {
    storage: Arc<dyn StorageClient>,
    registry: Arc<dyn DeviceRegistry>,
    writer: Arc<dyn ExportWriter>,
    config: ConversionConfig,
    collections: CollectionNames,
}

impl ConversionOrchestrator {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        registry: Arc<dyn DeviceRegistry>,
        writer: Arc<dyn ExportWriter>,
        config: ConversionConfig,
    ) -> Self {
        Self {
            storage,
            registry,
            writer,
            config,
            collections: CollectionNames::default(),
        }
    }

    /// Read entities from non-default collection names
    pub fn with_collections(mut self, collections: CollectionNames) -> Self {
        self.collections = collections;
        self
    }

    /// Convert every entity of `kind` stored for `tenant_id`
    pub async fn convert(
        &self,
        kind: EntityKind,
        tenant_id: &str,
    ) -> Result<ConversionReport, ConvertError> {
        self.convert_with_cancel(kind, tenant_id, &CancellationToken::new())
            .await
    }

    /// Same as [`convert`](Self::convert), stopping early once `cancel` fires.
    ///
    /// Items already running finish; items not yet picked up are never
    /// started and no registry call is issued for them. A cancelled run
    /// writes nothing.
    pub async fn convert_with_cancel(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ConversionReport, ConvertError> {
        if let Err(source) = validate_tenant_id(tenant_id) {
            warn!("Rejected {} conversion: {}", kind, source);
            return Err(ConvertError::InvalidTenant {
                tenant_id: tenant_id.to_string(),
                kind,
                source,
            });
        }

        let operation = ConversionOperation::start(tenant_id, kind);
        let operation_id = operation.operation_id.clone();
        info!(
            operation_id = %operation_id,
            tenant_id = %tenant_id,
            kind = %kind,
            "Conversion started"
        );
        self.stage(&operation_id, ConversionStage::Started);

        // Fetch
        let collection = self.collections.for_kind(kind);
        self.stage(&operation_id, ConversionStage::Fetching);
        let records = self
            .storage
            .fetch_all(tenant_id, collection)
            .await
            .map_err(|source| ConvertError::Storage {
                tenant_id: tenant_id.to_string(),
                kind,
                source,
            })?;

        if records.is_empty() {
            return Err(ConvertError::EmptyEntities {
                tenant_id: tenant_id.to_string(),
                kind,
            });
        }
        if let Some(limit) = self.config.max_entities {
            if records.len() > limit {
                return Err(ConvertError::CollectionTooLarge {
                    tenant_id: tenant_id.to_string(),
                    kind,
                    count: records.len(),
                    limit,
                });
            }
        }

        // Per-item work, bounded
        let total = records.len();
        self.stage(&operation_id, ConversionStage::PerItemProcessing);
        debug!(
            "Processing {} {} records with concurrency {}",
            total, kind, self.config.max_concurrency
        );
        let outcomes: Vec<ItemOutcome> = stream::iter(records)
            .map(|record| self.process_item(kind, tenant_id, record, cancel))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut export_records = Vec::with_capacity(total);
        let mut counts = ConversionCounts::default();
        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        let mut not_started = 0;
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Converted(record) => {
                    counts.converted += 1;
                    export_records.push(record);
                },
                ItemOutcome::Skipped(item) => {
                    counts.skipped += 1;
                    skipped.push(item);
                },
                ItemOutcome::Failed(failure) => {
                    counts.failed += 1;
                    failures.push(failure);
                },
                ItemOutcome::NotStarted => not_started += 1,
            }
        }

        if cancel.is_cancelled() {
            counts.total = counts.converted + counts.skipped + counts.failed;
            warn!(
                "Conversion {} cancelled: {} processed, {} not started",
                operation_id, counts.total, not_started
            );
            return Err(ConvertError::Cancelled {
                tenant_id: tenant_id.to_string(),
                kind,
                operation_id,
                counts,
                not_started,
            });
        }
        counts.total = total;

        // Write
        let mut batch = ExportBatch::new(operation, export_records);
        if self.config.record_order == RecordOrder::Key {
            batch.sort_by_key();
        }
        self.stage(&operation_id, ConversionStage::Writing);
        if let Err(source) = self
            .writer
            .write(tenant_id, kind, &operation_id, &batch)
            .await
        {
            error!(
                code = source.error_code(),
                "Export write for operation {} failed: {}", operation_id, source
            );
            return Err(ConvertError::Write {
                tenant_id: tenant_id.to_string(),
                kind,
                operation_id,
                source,
            });
        }

        self.stage(&operation_id, ConversionStage::Completed);
        info!(
            operation_id = %operation_id,
            converted = counts.converted,
            skipped = counts.skipped,
            failed = counts.failed,
            total = counts.total,
            "Conversion completed"
        );

        Ok(ConversionReport {
            operation_id,
            tenant_id: tenant_id.to_string(),
            entity_kind: kind,
            counts,
            failures,
            skipped,
        })
    }

    fn stage(&self, operation_id: &str, stage: ConversionStage) {
        debug!("Operation {} -> {}", operation_id, stage);
    }

    async fn process_item(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        record: ValueRecord,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        if cancel.is_cancelled() {
            return ItemOutcome::NotStarted;
        }

        let entity = match parse(kind, &record) {
            Ok(entity) => entity,
            Err(err) => return item_error(record.key, err),
        };

        match entity {
            Entity::Rule(rule) if rule.deleted => {
                debug!("Skipping deleted rule {}", record.key);
                ItemOutcome::Skipped(SkippedItem {
                    key: record.key,
                    reason: SkipReason::Deleted,
                })
            },
            Entity::Rule(rule) => {
                ItemOutcome::Converted(ExportRecord::Rule(RuleExportRecord::from_entity(
                    &record.key,
                    &rule,
                )))
            },
            Entity::DeviceGroup(group) => self.resolve_group(tenant_id, record.key, group).await,
        }
    }

    async fn resolve_group(
        &self,
        tenant_id: &str,
        key: String,
        group: DeviceGroupEntity,
    ) -> ItemOutcome {
        debug!(
            "Resolving devices for group {} ({} conditions)",
            key,
            group.conditions.len()
        );
        match self.registry.resolve(&group.conditions, tenant_id).await {
            Ok(devices) => {
                if devices.is_empty() {
                    debug!("Group {} matched no devices", key);
                } else {
                    debug!("Group {} resolved to {} devices", key, devices.len());
                }
                ItemOutcome::Converted(ExportRecord::DeviceGroup(DeviceGroupExportRecord::new(
                    &key, &group, &devices,
                )))
            },
            Err(e) => item_error(key, ItemError::RegistryDependency(e.to_string())),
        }
    }
}

fn item_error(key: String, err: ItemError) -> ItemOutcome {
    match err.failure_kind() {
        None => {
            debug!("Skipping {}: {}", key, err);
            ItemOutcome::Skipped(SkippedItem {
                key,
                reason: SkipReason::BlankContent,
            })
        },
        Some(reason) => {
            warn!(key = %key, reason = ?reason, "Item conversion failed: {}", err.detail());
            ItemOutcome::Failed(ItemFailure {
                key,
                reason,
                message: err.to_string(),
            })
        },
    }
}
