//! Filesystem export writer
//!
//! Layout: `{root}/{tenant}/{kind}/{operationId}.json`. Each artifact is
//! written to a hidden temporary sibling and renamed into place.

use std::path::PathBuf;

use asa_model::{EntityKind, ExportBatch};
use async_trait::async_trait;
use errors::{AsaError, Result};
use tracing::debug;

use crate::keyspace::validate_tenant_id;
use crate::traits::ExportWriter;

/// Export writer that stores each batch as a JSON file
#[derive(Debug, Clone)]
pub struct FileExportWriter {
    root: PathBuf,
}

impl FileExportWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Final location of an artifact
    pub fn artifact_path(&self, tenant_id: &str, kind: EntityKind, operation_id: &str) -> PathBuf {
        self.root
            .join(tenant_id)
            .join(kind.as_str())
            .join(format!("{}.json", operation_id))
    }

    /// Read back a written artifact
    pub async fn read(
        &self,
        tenant_id: &str,
        kind: EntityKind,
        operation_id: &str,
    ) -> Result<Option<ExportBatch>> {
        let path = self.artifact_path(tenant_id, kind, operation_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_operation_id(operation_id: &str) -> Result<()> {
    if operation_id.is_empty()
        || !operation_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AsaError::Validation(format!(
            "operation id '{}' is not path-safe",
            operation_id
        )));
    }
    Ok(())
}

#[async_trait]
impl ExportWriter for FileExportWriter {
    async fn write(
        &self,
        tenant_id: &str,
        kind: EntityKind,
        operation_id: &str,
        batch: &ExportBatch,
    ) -> Result<()> {
        validate_tenant_id(tenant_id)?;
        validate_operation_id(operation_id)?;

        let path = self.artifact_path(tenant_id, kind, operation_id);
        let dir = path
            .parent()
            .ok_or_else(|| AsaError::Internal(format!("no parent for {}", path.display())))?;
        tokio::fs::create_dir_all(dir).await?;

        let tmp = dir.join(format!(".{}.json.tmp", operation_id));
        let bytes = batch.to_json_vec()?;
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path() {
        let writer = FileExportWriter::new("/var/lib/asa");
        assert_eq!(
            writer.artifact_path("t1", EntityKind::Rule, "op-1"),
            PathBuf::from("/var/lib/asa/t1/rules/op-1.json")
        );
    }

    #[test]
    fn test_validate_operation_id() {
        assert!(validate_operation_id("3f2b8c1e-1d2a-4c1b-9d7e-0a1b2c3d4e5f").is_ok());
        assert!(validate_operation_id("").is_err());
        assert!(validate_operation_id("../escape").is_err());
    }
}
