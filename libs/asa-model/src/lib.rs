//! ASA Model - entity conversion data model
//!
//! Typed representations of the entities kept in the key-value store, the
//! parser that turns an opaque value record into one of them, and the flat
//! records exported to the stream-processing job.
//!
//! # Data flow
//!
//! ```text
//! ┌─────────────┐  parse   ┌──────────────┐  flatten  ┌──────────────┐
//! │ ValueRecord │─────────▶│    Entity    │──────────▶│ ExportRecord │
//! │ (key, JSON) │          │ Rule / Group │           │  (per kind)  │
//! └─────────────┘          └──────────────┘           └──────────────┘
//! ```

mod error;
pub mod export;
mod parser;
pub mod types;

pub use error::ItemError;
pub use export::{
    ActionLeaf, ConditionLeaf, ConversionCounts, ConversionOperation, ConversionReport,
    DeviceGroupExportRecord, ExportBatch, ExportRecord, FailureKind, ItemFailure,
    RuleExportRecord, SkipReason, SkippedItem,
};
pub use parser::{decoder_for, parse, Decoder};
pub use types::{
    ActionModel, Calculation, Condition, DeviceGroupEntity, DeviceListResult, Entity,
    EntityKind, RuleEntity, TimePeriod, ValueRecord,
};
