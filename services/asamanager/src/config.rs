//! Service configuration
//!
//! Defaults, then the YAML file, then `ASA_`-prefixed environment variables
//! (nested keys split on `__`, e.g. `ASA_CONVERSION__MAX_CONCURRENCY=4`).

use std::path::{Path, PathBuf};

use asa_model::EntityKind;
use common::{get_string_config, load_layered, LogConfig};
use errors::{AsaError, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "ASA_";

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config/asamanager.yaml";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AsaConfig {
    pub service: ServiceSection,
    pub storage: StorageSection,
    pub device_registry: RegistrySection,
    pub conversion: ConversionConfig,
    pub export: ExportSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
    pub log_level: String,
    pub log_dir: String,
    pub enable_json_log: bool,
    pub enable_file_log: bool,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "asamanager".to_string(),
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
            enable_json_log: false,
            enable_file_log: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub redis_url: String,
    pub max_connections: u32,
    pub rules_collection: String,
    pub device_groups_collection: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
            rules_collection: EntityKind::Rule.default_collection().to_string(),
            device_groups_collection: EntityKind::DeviceGroup.default_collection().to_string(),
        }
    }
}

impl StorageSection {
    pub fn collections(&self) -> CollectionNames {
        CollectionNames {
            rules: self.rules_collection.clone(),
            device_groups: self.device_groups_collection.clone(),
        }
    }
}

/// Storage collection holding each entity kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    pub rules: String,
    pub device_groups: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        StorageSection::default().collections()
    }
}

impl CollectionNames {
    pub fn for_kind(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Rule => &self.rules,
            EntityKind::DeviceGroup => &self.device_groups,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// Base URL; `/devices` is appended
    pub url: String,
    pub timeout_ms: u64,
    /// Header carrying the tenant id on every request
    pub tenant_header: String,
    /// Optional `pageSize` hint sent with each query
    pub page_size: Option<u32>,
    /// Upper bound on continuation pages followed per query
    pub max_pages: usize,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/v1".to_string(),
            timeout_ms: 10_000,
            tenant_header: "ApplicationTenantID".to_string(),
            page_size: None,
            max_pages: 100,
        }
    }
}

/// Order of records inside an export artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrder {
    /// Whatever order the workers finished in
    #[default]
    Completion,
    /// Sorted by entity key
    Key,
}

/// Knobs for a single conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Items processed (and registry calls in flight) at once
    pub max_concurrency: usize,
    /// Abort before per-item work when a collection is larger than this
    pub max_entities: Option<usize>,
    pub record_order: RecordOrder,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            max_entities: None,
            record_order: RecordOrder::Completion,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTarget {
    #[default]
    Redis,
    File,
    /// Keep artifacts in process memory only (dry run)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub target: ExportTarget,
    /// Root directory for the `file` target
    pub dir: String,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            target: ExportTarget::Redis,
            dir: "exports".to_string(),
        }
    }
}

impl AsaConfig {
    /// Load configuration from `path` (if any) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: AsaConfig = load_layered(path, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve which configuration file to use.
    ///
    /// Explicit path first (the CLI flag also reads `ASA_CONFIG_FILE`), then
    /// the default location if it exists.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.conversion.max_concurrency == 0 {
            return Err(invalid("conversion.max_concurrency", "must be at least 1"));
        }
        if self.conversion.max_entities == Some(0) {
            return Err(invalid("conversion.max_entities", "must be at least 1 when set"));
        }
        if self.storage.redis_url.trim().is_empty() {
            return Err(invalid("storage.redis_url", "must not be empty"));
        }
        if self.storage.max_connections == 0 {
            return Err(invalid("storage.max_connections", "must be at least 1"));
        }
        if self.storage.rules_collection.trim().is_empty() {
            return Err(invalid("storage.rules_collection", "must not be empty"));
        }
        if self.storage.device_groups_collection.trim().is_empty() {
            return Err(invalid("storage.device_groups_collection", "must not be empty"));
        }
        if self.device_registry.url.trim().is_empty() {
            return Err(invalid("device_registry.url", "must not be empty"));
        }
        if self.device_registry.timeout_ms == 0 {
            return Err(invalid("device_registry.timeout_ms", "must be at least 1"));
        }
        if self.device_registry.tenant_header.trim().is_empty() {
            return Err(invalid("device_registry.tenant_header", "must not be empty"));
        }
        if self.device_registry.max_pages == 0 {
            return Err(invalid("device_registry.max_pages", "must be at least 1"));
        }
        if self.export.target == ExportTarget::File && self.export.dir.trim().is_empty() {
            return Err(invalid("export.dir", "required for the file target"));
        }
        Ok(())
    }

    /// Logger settings derived from the service section
    pub fn to_log_config(&self) -> LogConfig {
        let default = ServiceSection::default();
        let log_dir = get_string_config(
            Some(self.service.log_dir.clone()),
            self.service.log_dir == default.log_dir,
            "ASA_LOG_DIR",
            default.log_dir.clone(),
        );

        let level = common::logging::parse_level(&self.service.log_level, tracing::Level::INFO);
        LogConfig {
            service_name: self.service.name.clone(),
            log_dir: PathBuf::from(log_dir),
            console_level: level,
            file_level: level,
            enable_json: self.service.enable_json_log,
            enable_file: self.service.enable_file_log,
        }
    }
}

fn invalid(field: &str, reason: &str) -> AsaError {
    AsaError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
