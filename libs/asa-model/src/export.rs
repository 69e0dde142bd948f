//! Export record definitions
//!
//! Flat, pipeline-produced records handed to the export writer, the batch
//! that groups them under one conversion operation, and the per-operation
//! report returned to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ActionModel, Calculation, DeviceGroupEntity, DeviceListResult, EntityKind, RuleEntity,
};

// ============================================================================
// Conversion Operation
// ============================================================================

/// Identity of one Convert invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOperation {
    pub operation_id: String,
    pub tenant_id: String,
    pub entity_kind: EntityKind,
    pub started_at: DateTime<Utc>,
}

impl ConversionOperation {
    /// Start a new operation with a freshly generated id
    pub fn start(tenant_id: impl Into<String>, entity_kind: EntityKind) -> Self {
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            entity_kind,
            started_at: Utc::now(),
        }
    }
}

// ============================================================================
// Rule export
// ============================================================================

/// Condition leaf as consumed by the stream job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionLeaf {
    pub field: String,
    pub operator: String,
    pub value: serde_json::Value,
}

/// Action leaf as consumed by the stream job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLeaf {
    #[serde(rename = "type")]
    pub action_type: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub notes: String,
}

impl From<&ActionModel> for ActionLeaf {
    fn from(action: &ActionModel) -> Self {
        match action {
            ActionModel::Email {
                recipients,
                subject,
                notes,
            } => ActionLeaf {
                action_type: action.type_name().to_string(),
                recipients: recipients.clone(),
                subject: subject.clone(),
                notes: notes.clone(),
            },
        }
    }
}

/// Denormalized rule as written to the reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExportRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub group_id: String,
    pub severity: String,
    pub calculation: Calculation,
    /// `instant` or `tumblingWindow{N}Minutes`
    pub aggregation_window: String,
    pub enabled: bool,
    /// Distinct condition keys, in first-seen order
    pub fields: Vec<String>,
    pub conditions: Vec<ConditionLeaf>,
    pub actions: Vec<ActionLeaf>,
}

impl RuleExportRecord {
    pub fn from_entity(key: &str, rule: &RuleEntity) -> Self {
        let aggregation_window = match rule.calculation {
            Calculation::Instant => "instant".to_string(),
            Calculation::Average => {
                format!("tumblingWindow{}Minutes", rule.time_period.minutes())
            },
        };

        let mut fields: Vec<String> = Vec::with_capacity(rule.conditions.len());
        for condition in &rule.conditions {
            if !fields.contains(&condition.key) {
                fields.push(condition.key.clone());
            }
        }

        Self {
            id: key.to_string(),
            name: rule.name.clone(),
            description: rule.description.clone(),
            group_id: rule.group_id.clone(),
            severity: rule.severity.clone(),
            calculation: rule.calculation,
            aggregation_window,
            enabled: rule.enabled,
            fields,
            conditions: rule
                .conditions
                .iter()
                .map(|c| ConditionLeaf {
                    field: c.key.clone(),
                    operator: c.operator.clone(),
                    value: c.value.clone(),
                })
                .collect(),
            actions: rule.actions.iter().map(ActionLeaf::from).collect(),
        }
    }
}

// ============================================================================
// Device group export
// ============================================================================

/// Device group with its resolved membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGroupExportRecord {
    pub group_id: String,
    pub display_name: String,
    pub device_ids: Vec<String>,
}

impl DeviceGroupExportRecord {
    pub fn new(key: &str, group: &DeviceGroupEntity, devices: &DeviceListResult) -> Self {
        Self {
            group_id: key.to_string(),
            display_name: group.display_name.clone(),
            device_ids: devices.device_ids(),
        }
    }
}

// ============================================================================
// Export record & batch
// ============================================================================

/// Single exported unit, shaped by entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportRecord {
    Rule(RuleExportRecord),
    DeviceGroup(DeviceGroupExportRecord),
}

impl ExportRecord {
    /// Key of the entity this record was produced from
    pub fn key(&self) -> &str {
        match self {
            ExportRecord::Rule(r) => &r.id,
            ExportRecord::DeviceGroup(g) => &g.group_id,
        }
    }
}

/// All records produced by one Convert invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBatch {
    #[serde(flatten)]
    pub operation: ConversionOperation,
    pub records: Vec<ExportRecord>,
}

impl ExportBatch {
    pub fn new(operation: ConversionOperation, records: Vec<ExportRecord>) -> Self {
        Self { operation, records }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation.operation_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Order records by entity key
    pub fn sort_by_key(&mut self) {
        self.records.sort_by(|a, b| a.key().cmp(b.key()));
    }

    /// Serialized artifact as written by export writers
    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Why an item was counted as failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    MalformedEntity,
    RegistryDependencyError,
}

/// Why an item was counted as skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    BlankContent,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub key: String,
    pub reason: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub key: String,
    pub reason: SkipReason,
}

/// Per-operation counters; `converted + skipped + failed == total`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionCounts {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

/// Result of a completed Convert invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub operation_id: String,
    pub tenant_id: String,
    pub entity_kind: EntityKind,
    pub counts: ConversionCounts,
    pub failures: Vec<ItemFailure>,
    pub skipped: Vec<SkippedItem>,
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::{Condition, TimePeriod};
    use serde_json::json;

    fn sample_rule(calculation: Calculation) -> RuleEntity {
        RuleEntity {
            name: "Chiller pressure".to_string(),
            description: "Pressure too high".to_string(),
            group_id: "chillers".to_string(),
            severity: "Critical".to_string(),
            calculation,
            time_period: TimePeriod::FiveMinutes,
            enabled: true,
            deleted: false,
            conditions: vec![
                Condition::new("pressure", "GreaterThan", 250),
                Condition::new("temperature", "GreaterThan", 90),
                Condition::new("pressure", "LessThan", 400),
            ],
            actions: vec![ActionModel::Email {
                recipients: vec!["ops@contoso.com".to_string()],
                subject: "Alert".to_string(),
                notes: String::new(),
            }],
        }
    }

    #[test]
    fn test_rule_export_flattening() {
        let record = RuleExportRecord::from_entity("r1", &sample_rule(Calculation::Average));
        assert_eq!(record.id, "r1");
        assert_eq!(record.aggregation_window, "tumblingWindow5Minutes");
        assert_eq!(record.fields, vec!["pressure", "temperature"]);
        assert_eq!(record.conditions.len(), 3);
        assert_eq!(record.conditions[1].field, "temperature");
        assert_eq!(record.actions[0].action_type, "Email");

        let instant = RuleExportRecord::from_entity("r2", &sample_rule(Calculation::Instant));
        assert_eq!(instant.aggregation_window, "instant");
    }

    #[test]
    fn test_batch_serialization_shape() {
        let operation = ConversionOperation::start("tenant-a", EntityKind::DeviceGroup);
        let group = DeviceGroupEntity {
            display_name: "Trucks".to_string(),
            conditions: vec![],
        };
        let devices: DeviceListResult = vec![("truck-01", json!({}))].into_iter().collect();
        let batch = ExportBatch::new(
            operation.clone(),
            vec![ExportRecord::DeviceGroup(DeviceGroupExportRecord::new(
                "g1", &group, &devices,
            ))],
        );

        let value: serde_json::Value =
            serde_json::from_slice(&batch.to_json_vec().unwrap()).unwrap();
        assert_eq!(value["operationId"], json!(operation.operation_id));
        assert_eq!(value["tenantId"], json!("tenant-a"));
        assert_eq!(value["entityKind"], json!("devicegroups"));
        assert_eq!(value["records"][0]["groupId"], json!("g1"));
        assert_eq!(value["records"][0]["deviceIds"], json!(["truck-01"]));
    }

    #[test]
    fn test_sort_by_key() {
        let operation = ConversionOperation::start("t", EntityKind::Rule);
        let mut batch = ExportBatch::new(
            operation,
            vec![
                ExportRecord::Rule(RuleExportRecord::from_entity(
                    "r2",
                    &sample_rule(Calculation::Instant),
                )),
                ExportRecord::Rule(RuleExportRecord::from_entity(
                    "r1",
                    &sample_rule(Calculation::Instant),
                )),
            ],
        );
        batch.sort_by_key();
        let keys: Vec<&str> = batch.records.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["r1", "r2"]);
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let a = ConversionOperation::start("t", EntityKind::Rule);
        let b = ConversionOperation::start("t", EntityKind::Rule);
        assert_ne!(a.operation_id, b.operation_id);
    }
}
