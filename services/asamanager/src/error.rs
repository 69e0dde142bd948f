//! Batch-fatal conversion errors
//!
//! Per-item problems never surface here; they end up in the report. These
//! variants abort the whole Convert call and nothing is written.

use std::fmt;

use asa_model::{ConversionCounts, EntityKind};
use errors::AsaError;
use thiserror::Error;

/// Lifecycle stage of a conversion operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStage {
    Started,
    Fetching,
    PerItemProcessing,
    Writing,
    Completed,
    AbortedInvalidTenant,
    AbortedEmptyInput,
    AbortedTooLarge,
    AbortedStorageError,
    AbortedWriteError,
    Cancelled,
}

impl ConversionStage {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            ConversionStage::Started
                | ConversionStage::Fetching
                | ConversionStage::PerItemProcessing
                | ConversionStage::Writing
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStage::Started => "started",
            ConversionStage::Fetching => "fetching",
            ConversionStage::PerItemProcessing => "per_item_processing",
            ConversionStage::Writing => "writing",
            ConversionStage::Completed => "completed",
            ConversionStage::AbortedInvalidTenant => "aborted_invalid_tenant",
            ConversionStage::AbortedEmptyInput => "aborted_empty_input",
            ConversionStage::AbortedTooLarge => "aborted_too_large",
            ConversionStage::AbortedStorageError => "aborted_storage_error",
            ConversionStage::AbortedWriteError => "aborted_write_error",
            ConversionStage::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a Convert call
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid tenant id '{tenant_id}' for {kind} conversion: {source}")]
    InvalidTenant {
        tenant_id: String,
        kind: EntityKind,
        #[source]
        source: AsaError,
    },

    #[error("No {kind} found for tenant {tenant_id}")]
    EmptyEntities { tenant_id: String, kind: EntityKind },

    #[error("Tenant {tenant_id} has {count} {kind}, limit is {limit}")]
    CollectionTooLarge {
        tenant_id: String,
        kind: EntityKind,
        count: usize,
        limit: usize,
    },

    #[error("Failed to fetch {kind} for tenant {tenant_id}: {source}")]
    Storage {
        tenant_id: String,
        kind: EntityKind,
        #[source]
        source: AsaError,
    },

    #[error("Failed to write {kind} export {operation_id} for tenant {tenant_id}: {source}")]
    Write {
        tenant_id: String,
        kind: EntityKind,
        operation_id: String,
        #[source]
        source: AsaError,
    },

    #[error(
        "Conversion {operation_id} of {kind} for tenant {tenant_id} cancelled with \
         {not_started} items not started"
    )]
    Cancelled {
        tenant_id: String,
        kind: EntityKind,
        operation_id: String,
        /// Outcomes of the items that did run
        counts: ConversionCounts,
        not_started: usize,
    },
}

impl ConvertError {
    /// Terminal stage the operation ended in
    pub fn stage(&self) -> ConversionStage {
        match self {
            ConvertError::InvalidTenant { .. } => ConversionStage::AbortedInvalidTenant,
            ConvertError::EmptyEntities { .. } => ConversionStage::AbortedEmptyInput,
            ConvertError::CollectionTooLarge { .. } => ConversionStage::AbortedTooLarge,
            ConvertError::Storage { .. } => ConversionStage::AbortedStorageError,
            ConvertError::Write { .. } => ConversionStage::AbortedWriteError,
            ConvertError::Cancelled { .. } => ConversionStage::Cancelled,
        }
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            ConvertError::InvalidTenant { tenant_id, .. }
            | ConvertError::EmptyEntities { tenant_id, .. }
            | ConvertError::CollectionTooLarge { tenant_id, .. }
            | ConvertError::Storage { tenant_id, .. }
            | ConvertError::Write { tenant_id, .. }
            | ConvertError::Cancelled { tenant_id, .. } => tenant_id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            ConvertError::InvalidTenant { kind, .. }
            | ConvertError::EmptyEntities { kind, .. }
            | ConvertError::CollectionTooLarge { kind, .. }
            | ConvertError::Storage { kind, .. }
            | ConvertError::Write { kind, .. }
            | ConvertError::Cancelled { kind, .. } => *kind,
        }
    }

    /// Whether running the same conversion again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ConvertError::Storage { source, .. } | ConvertError::Write { source, .. } => {
                source.is_retryable()
            },
            ConvertError::Cancelled { .. } => true,
            _ => false,
        }
    }
}
