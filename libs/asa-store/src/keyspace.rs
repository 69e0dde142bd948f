//! Key naming for the storage and export namespaces
//!
//! ```text
//! {prefix}:kv:{tenant}:{collection}              hash, field = record key
//! {prefix}:export:{tenant}:{kind}:{operationId}  export artifact (JSON)
//! {prefix}:export:{tenant}:{kind}:latest         last written operation id
//! ```

use asa_model::EntityKind;
use errors::{AsaError, Result};

/// Default key prefix
pub const DEFAULT_PREFIX: &str = "asa";

/// Key space configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Hash holding a tenant's collection
    pub fn collection_key(&self, tenant_id: &str, collection: &str) -> String {
        format!("{}:kv:{}:{}", self.prefix, tenant_id, collection)
    }

    /// Export artifact of one operation
    pub fn export_key(&self, tenant_id: &str, kind: EntityKind, operation_id: &str) -> String {
        format!(
            "{}:export:{}:{}:{}",
            self.prefix,
            tenant_id,
            kind.as_str(),
            operation_id
        )
    }

    /// Pointer to the most recently written operation
    pub fn latest_export_key(&self, tenant_id: &str, kind: EntityKind) -> String {
        format!("{}:export:{}:{}:latest", self.prefix, tenant_id, kind.as_str())
    }
}

/// Reject tenant ids that are empty or would break key/path composition
pub fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    if tenant_id.trim().is_empty() {
        return Err(AsaError::Validation("tenant id must not be empty".to_string()));
    }
    if let Some(c) = tenant_id
        .chars()
        .find(|c| matches!(c, ':' | '/' | '\\') || c.is_whitespace() || c.is_control())
    {
        return Err(AsaError::Validation(format!(
            "tenant id '{}' contains forbidden character {:?}",
            tenant_id, c
        )));
    }
    if tenant_id == "." || tenant_id == ".." {
        return Err(AsaError::Validation(format!(
            "tenant id '{}' is not allowed",
            tenant_id
        )));
    }
    Ok(())
}
