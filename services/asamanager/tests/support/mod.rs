//! Shared fixtures for the pipeline tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use asa_model::{Condition, DeviceListResult};
use asa_store::MemoryStorage;
use asamanager::{ConversionConfig, ConversionOrchestrator, DeviceRegistry};
use async_trait::async_trait;
use errors::{AsaError, Result};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub const TENANT: &str = "contoso";

/// In-process registry over a fixed device table.
///
/// A device matches when every condition's `key` is a tag whose value equals
/// the condition's `value`. Conditions whose value is listed in `fail_values`
/// make the call time out.
pub struct ScriptedRegistry {
    devices: Vec<(String, Value)>,
    fail_values: HashSet<String>,
    delay: Option<Duration>,
    cancel_on_first_call: Mutex<Option<CancellationToken>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self {
            devices: vec![
                ("truck-01".to_string(), json!({"type": "truck", "site": "north"})),
                ("truck-02".to_string(), json!({"type": "truck", "site": "south"})),
                ("chiller-01".to_string(), json!({"type": "chiller", "site": "north"})),
            ],
            fail_values: HashSet::new(),
            delay: None,
            cancel_on_first_call: Mutex::new(None),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, value: &str) -> Self {
        self.fail_values.insert(value.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cancel `token` from inside the first resolve call
    pub fn cancelling(self, token: CancellationToken) -> Self {
        if let Ok(mut slot) = self.cancel_on_first_call.lock() {
            *slot = Some(token);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn matches(tags: &Value, conditions: &[Condition]) -> bool {
        conditions
            .iter()
            .all(|c| tags.get(&c.key).map(|v| v == &c.value).unwrap_or(false))
    }
}

#[async_trait]
impl DeviceRegistry for ScriptedRegistry {
    async fn resolve(&self, conditions: &[Condition], _tenant_id: &str) -> Result<DeviceListResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(token) = self.cancel_on_first_call.lock().ok().and_then(|mut s| s.take()) {
            token.cancel();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fails = conditions.iter().any(|c| {
            c.value
                .as_str()
                .map(|v| self.fail_values.contains(v))
                .unwrap_or(false)
        });
        if fails {
            return Err(AsaError::Timeout("device registry request".to_string()));
        }

        Ok(self
            .devices
            .iter()
            .filter(|(_, tags)| Self::matches(tags, conditions))
            .map(|(id, tags)| (id.clone(), tags.clone()))
            .collect())
    }
}

pub fn orchestrator(
    storage: &Arc<MemoryStorage>,
    registry: &Arc<ScriptedRegistry>,
    config: ConversionConfig,
) -> ConversionOrchestrator {
    ConversionOrchestrator::new(storage.clone(), registry.clone(), storage.clone(), config)
}

pub fn rule_json(name: &str) -> String {
    json!({
        "name": name,
        "description": "Too hot",
        "groupId": "chillers",
        "severity": "Critical",
        "calculation": "Average",
        "timePeriod": 300000,
        "conditions": [
            {"key": "temperature", "operator": "GreaterThan", "value": 90}
        ],
        "actions": [
            {"type": "Email", "recipients": ["ops@contoso.com"], "subject": "Alarm"}
        ]
    })
    .to_string()
}

pub fn group_json(display_name: &str, device_type: &str) -> String {
    json!({
        "displayName": display_name,
        "conditions": [
            {"key": "type", "operator": "EQ", "value": device_type}
        ]
    })
    .to_string()
}
