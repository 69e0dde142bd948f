//! ASA Manager - entity conversion and export pipeline
//!
//! Pulls tenant-scoped rules and device groups out of the key-value store,
//! reshapes them into flat reference-data records, resolves device-group
//! membership through the device registry and writes one export artifact
//! per conversion operation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  fetch  ┌──────────────┐  resolve  ┌─────────────────┐
//! │   Storage    │◀────────│ Orchestrator │──────────▶│ Device Registry │
//! │ (Redis/mem)  │         │  (convert)   │           │     (HTTP)      │
//! └──────────────┘         └──────┬───────┘           └─────────────────┘
//!                                 │ write
//!                                 ▼
//!                          ┌──────────────┐
//!                          │ExportWriter  │
//!                          │(Redis/file)  │
//!                          └──────────────┘
//! ```

pub mod config;
pub mod device_registry;
mod error;
pub mod orchestrator;

pub use config::{AsaConfig, CollectionNames, ConversionConfig, ExportTarget, RecordOrder};
pub use device_registry::{DeviceRegistry, HttpDeviceRegistry};
pub use error::{ConversionStage, ConvertError};
pub use orchestrator::ConversionOrchestrator;
