//! Integration tests for the filesystem export writer
//!
//! Writes real artifacts into a temporary directory and reads them back.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use asa_model::{
    ConversionOperation, DeviceGroupEntity, DeviceGroupExportRecord, DeviceListResult, EntityKind,
    ExportBatch, ExportRecord,
};
use asa_store::{ExportWriter, FileExportWriter};
use serde_json::json;

fn sample_batch(tenant: &str) -> ExportBatch {
    let operation = ConversionOperation::start(tenant, EntityKind::DeviceGroup);
    let group = DeviceGroupEntity {
        display_name: "Chillers".to_string(),
        conditions: vec![],
    };
    let devices: DeviceListResult = vec![
        ("chiller-01", json!({"firmware": "1.2"})),
        ("chiller-02", json!({})),
    ]
    .into_iter()
    .collect();
    ExportBatch::new(
        operation,
        vec![ExportRecord::DeviceGroup(DeviceGroupExportRecord::new(
            "g-chillers",
            &group,
            &devices,
        ))],
    )
}

#[tokio::test]
async fn test_write_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FileExportWriter::new(dir.path());
    let batch = sample_batch("tenant-a");
    let op_id = batch.operation_id().to_string();

    writer
        .write("tenant-a", EntityKind::DeviceGroup, &op_id, &batch)
        .await
        .unwrap();

    let path = writer.artifact_path("tenant-a", EntityKind::DeviceGroup, &op_id);
    assert!(path.exists());

    let read = writer
        .read("tenant-a", EntityKind::DeviceGroup, &op_id)
        .await
        .unwrap();
    assert_eq!(read, Some(batch));

    // No temporary files left behind
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_rewrite_same_operation_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FileExportWriter::new(dir.path());
    let batch = sample_batch("tenant-a");
    let op_id = batch.operation_id().to_string();

    writer
        .write("tenant-a", EntityKind::DeviceGroup, &op_id, &batch)
        .await
        .unwrap();
    let first = std::fs::read(writer.artifact_path("tenant-a", EntityKind::DeviceGroup, &op_id))
        .unwrap();

    writer
        .write("tenant-a", EntityKind::DeviceGroup, &op_id, &batch)
        .await
        .unwrap();
    let second = std::fs::read(writer.artifact_path("tenant-a", EntityKind::DeviceGroup, &op_id))
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_read_missing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FileExportWriter::new(dir.path());
    let read = writer
        .read("tenant-a", EntityKind::Rule, "does-not-exist")
        .await
        .unwrap();
    assert!(read.is_none());
}

#[tokio::test]
async fn test_rejects_unsafe_tenant() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FileExportWriter::new(dir.path());
    let batch = sample_batch("../escape");
    let op_id = batch.operation_id().to_string();

    let result = writer
        .write("../escape", EntityKind::DeviceGroup, &op_id, &batch)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_failed_rename_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FileExportWriter::new(dir.path());
    let batch = sample_batch("tenant-a");
    let op_id = batch.operation_id().to_string();

    // A non-empty directory at the artifact path makes the rename fail
    let path = writer.artifact_path("tenant-a", EntityKind::DeviceGroup, &op_id);
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join("occupied"), b"x").unwrap();

    let result = writer
        .write("tenant-a", EntityKind::DeviceGroup, &op_id, &batch)
        .await;
    assert!(result.is_err());

    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
