//! Entity type definitions
//!
//! Core types for the stored entities:
//! - ValueRecord: wire-level record as returned by the storage service
//! - RuleEntity / DeviceGroupEntity: typed entities decoded from a record
//! - Condition, TimePeriod, Calculation, ActionModel: entity building blocks
//! - DeviceListResult: device registry answer for a condition set

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Entity Kind
// ============================================================================

/// Entity kinds the pipeline knows how to convert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "rules")]
    Rule,
    #[serde(rename = "devicegroups")]
    DeviceGroup,
}

impl EntityKind {
    /// Stable tag used in storage keys and export paths
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Rule => "rules",
            EntityKind::DeviceGroup => "devicegroups",
        }
    }

    /// Collection name used when the configuration does not override it
    pub fn default_collection(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule" | "rules" => Ok(EntityKind::Rule),
            "devicegroup" | "devicegroups" | "device-group" | "device-groups" => {
                Ok(EntityKind::DeviceGroup)
            },
            other => Err(format!(
                "Unknown entity kind: '{}'. Expected 'rules' or 'devicegroups'",
                other
            )),
        }
    }
}

// ============================================================================
// Value Record
// ============================================================================

/// Value record as stored in the key-value service
///
/// `data` is an opaque JSON document; it is only interpreted by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    /// Entity key within its collection
    pub key: String,

    /// Opaque JSON payload (may be absent or blank)
    #[serde(default)]
    pub data: Option<String>,

    /// Optimistic-concurrency tag
    #[serde(rename = "eTag", default)]
    pub etag: String,

    /// Last modification time
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Set when the stored bytes could not be read as text
    #[serde(skip)]
    pub decode_error: Option<String>,
}

impl ValueRecord {
    /// Build a fresh record with a generated eTag and the current timestamp
    pub fn new(key: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: Some(data.into()),
            etag: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now(),
            decode_error: None,
        }
    }

    /// Record whose stored bytes could not be decoded
    pub fn undecodable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            data: None,
            decode_error: Some(reason.into()),
            ..Self::new(key, "")
        }
    }

    /// Record whose payload is null
    pub fn without_data(key: impl Into<String>) -> Self {
        Self {
            data: None,
            ..Self::new(key, "")
        }
    }
}

// ============================================================================
// Shared building blocks
// ============================================================================

/// Single predicate term
///
/// Operators are not interpreted here; they are forwarded verbatim to the
/// device registry or copied into rule exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub operator: String,
    pub value: serde_json::Value,
}

impl Condition {
    pub fn new(
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            key: key.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Aggregation period of a rule, restricted to a fixed allow-list
///
/// Accepts a JSON number or a numeric string in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TimePeriodRepr", into = "u64")]
pub enum TimePeriod {
    OneMinute,
    FiveMinutes,
    TenMinutes,
}

impl TimePeriod {
    /// Allowed durations in milliseconds
    pub const ALLOWED_MS: [u64; 3] = [60_000, 300_000, 600_000];

    pub fn from_millis(ms: u64) -> Option<Self> {
        match ms {
            60_000 => Some(TimePeriod::OneMinute),
            300_000 => Some(TimePeriod::FiveMinutes),
            600_000 => Some(TimePeriod::TenMinutes),
            _ => None,
        }
    }

    pub fn as_millis(&self) -> u64 {
        match self {
            TimePeriod::OneMinute => 60_000,
            TimePeriod::FiveMinutes => 300_000,
            TimePeriod::TenMinutes => 600_000,
        }
    }

    pub fn minutes(&self) -> u64 {
        self.as_millis() / 60_000
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimePeriodRepr {
    Millis(u64),
    Text(String),
}

impl TryFrom<TimePeriodRepr> for TimePeriod {
    type Error = String;

    fn try_from(repr: TimePeriodRepr) -> Result<Self, Self::Error> {
        let ms = match repr {
            TimePeriodRepr::Millis(ms) => ms,
            TimePeriodRepr::Text(text) => text
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("timePeriod '{}' is not a number of milliseconds", text))?,
        };
        TimePeriod::from_millis(ms).ok_or_else(|| {
            format!(
                "timePeriod {} is not allowed (expected one of {:?})",
                ms,
                TimePeriod::ALLOWED_MS
            )
        })
    }
}

impl From<TimePeriod> for u64 {
    fn from(period: TimePeriod) -> Self {
        period.as_millis()
    }
}

/// How a rule's conditions are evaluated over its time period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Calculation {
    Average,
    Instant,
}

/// Rule action, discriminated by the `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionModel {
    Email {
        recipients: Vec<String>,
        #[serde(default)]
        subject: String,
        #[serde(default)]
        notes: String,
    },
}

impl ActionModel {
    /// Discriminator value as written in the payload
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionModel::Email { .. } => "Email",
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Alarm rule evaluated by the stream-processing job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntity {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Device group the rule applies to
    pub group_id: String,

    #[serde(default)]
    pub severity: String,

    pub calculation: Calculation,

    pub time_period: TimePeriod,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub deleted: bool,

    /// Ordered condition list
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub actions: Vec<ActionModel>,
}

fn default_enabled() -> bool {
    true
}

/// Named set of devices defined by conditions
///
/// An empty condition list matches every device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGroupEntity {
    pub display_name: String,
    pub conditions: Vec<Condition>,
}

/// Decoded entity of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Rule(RuleEntity),
    DeviceGroup(DeviceGroupEntity),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Rule(_) => EntityKind::Rule,
            Entity::DeviceGroup(_) => EntityKind::DeviceGroup,
        }
    }
}

// ============================================================================
// Device Registry result
// ============================================================================

/// Devices matched by a condition set, keyed by device id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceListResult {
    pub devices: BTreeMap<String, serde_json::Value>,
}

impl DeviceListResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device_id: impl Into<String>, metadata: serde_json::Value) {
        self.devices.insert(device_id.into(), metadata);
    }

    /// Matched device ids in ascending order
    pub fn device_ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, serde_json::Value)> for DeviceListResult {
    fn from_iter<I: IntoIterator<Item = (K, serde_json::Value)>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
