//! Entity Parser
//!
//! Decodes the opaque payload of a value record into a typed entity.
//! Decoding is selected through a static kind → function mapping; each
//! decoder runs serde and then the kind's semantic checks.

use crate::error::ItemError;
use crate::types::{
    ActionModel, Condition, DeviceGroupEntity, Entity, EntityKind, RuleEntity, ValueRecord,
};

/// Stateless decoder for one entity kind
pub type Decoder = fn(&str) -> Result<Entity, ItemError>;

/// Decoder responsible for `kind`
pub fn decoder_for(kind: EntityKind) -> Decoder {
    match kind {
        EntityKind::Rule => decode_rule,
        EntityKind::DeviceGroup => decode_device_group,
    }
}

/// Parse a value record as an entity of `kind`
///
/// Null, empty and whitespace-only payloads are `BlankContent`; everything
/// else that does not decode and validate is `MalformedEntity`, as are
/// records whose stored bytes were not valid UTF-8.
pub fn parse(kind: EntityKind, record: &ValueRecord) -> Result<Entity, ItemError> {
    if let Some(reason) = &record.decode_error {
        return Err(ItemError::malformed(format!(
            "Stored payload is not readable text: {}",
            reason
        )));
    }
    let data = match record.data.as_deref() {
        Some(data) if !data.trim().is_empty() => data,
        _ => return Err(ItemError::BlankContent),
    };

    decoder_for(kind)(data)
}

fn decode_rule(data: &str) -> Result<Entity, ItemError> {
    let rule: RuleEntity = serde_json::from_str(data)
        .map_err(|e| ItemError::malformed(format!("Failed to parse rule payload: {}", e)))?;
    validate_rule(&rule)?;
    Ok(Entity::Rule(rule))
}

fn decode_device_group(data: &str) -> Result<Entity, ItemError> {
    let group: DeviceGroupEntity = serde_json::from_str(data).map_err(|e| {
        ItemError::malformed(format!("Failed to parse device group payload: {}", e))
    })?;
    validate_conditions(&group.conditions)?;
    Ok(Entity::DeviceGroup(group))
}

fn validate_rule(rule: &RuleEntity) -> Result<(), ItemError> {
    if rule.name.trim().is_empty() {
        return Err(ItemError::malformed("Rule name is blank"));
    }
    validate_conditions(&rule.conditions)?;

    for action in &rule.actions {
        match action {
            ActionModel::Email { recipients, .. } => {
                if recipients.iter().all(|r| r.trim().is_empty()) {
                    return Err(ItemError::malformed("Email action has no recipients"));
                }
            },
        }
    }
    Ok(())
}

fn validate_conditions(conditions: &[Condition]) -> Result<(), ItemError> {
    if let Some(pos) = conditions.iter().position(|c| c.key.trim().is_empty()) {
        return Err(ItemError::malformed(format!(
            "Condition #{} has a blank key",
            pos
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::export::FailureKind;
    use crate::types::{Calculation, TimePeriod};
    use serde_json::json;

    fn rule_json() -> serde_json::Value {
        json!({
            "name": "High temperature",
            "description": "Chiller running hot",
            "groupId": "chillers",
            "severity": "Warning",
            "calculation": "Average",
            "timePeriod": "300000",
            "enabled": true,
            "conditions": [
                { "key": "temperature", "operator": "GreaterThan", "value": 75 }
            ],
            "actions": [
                { "type": "Email", "recipients": ["ops@contoso.com"], "subject": "Hot" }
            ]
        })
    }

    fn record(key: &str, data: impl Into<String>) -> ValueRecord {
        ValueRecord::new(key, data)
    }

    #[test]
    fn test_parse_valid_rule() {
        let entity = parse(EntityKind::Rule, &record("r1", rule_json().to_string())).unwrap();
        match entity {
            Entity::Rule(rule) => {
                assert_eq!(rule.name, "High temperature");
                assert_eq!(rule.calculation, Calculation::Average);
                assert_eq!(rule.time_period, TimePeriod::FiveMinutes);
                assert!(!rule.deleted);
                assert_eq!(rule.conditions.len(), 1);
                assert_eq!(rule.actions.len(), 1);
            },
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_valid_device_group() {
        let data = json!({
            "displayName": "Trucks",
            "conditions": [{ "key": "tags.type", "operator": "EQ", "value": "truck" }]
        });
        let entity = parse(EntityKind::DeviceGroup, &record("g1", data.to_string())).unwrap();
        assert_eq!(entity.kind(), EntityKind::DeviceGroup);
    }

    #[test]
    fn test_device_group_with_empty_conditions() {
        let data = json!({ "displayName": "All devices", "conditions": [] });
        let entity = parse(EntityKind::DeviceGroup, &record("g0", data.to_string())).unwrap();
        match entity {
            Entity::DeviceGroup(group) => assert!(group.conditions.is_empty()),
            other => panic!("expected device group, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_content() {
        assert_eq!(
            parse(EntityKind::Rule, &record("r", "")),
            Err(ItemError::BlankContent)
        );
        assert_eq!(
            parse(EntityKind::DeviceGroup, &record("g", "  \n\t ")),
            Err(ItemError::BlankContent)
        );
        assert_eq!(
            parse(EntityKind::Rule, &ValueRecord::without_data("r")),
            Err(ItemError::BlankContent)
        );
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = parse(EntityKind::Rule, &record("r3", "{not json")).unwrap_err();
        match err {
            ItemError::MalformedEntity(msg) => assert!(msg.contains("Failed to parse")),
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_record_is_malformed() {
        let record = ValueRecord::undecodable("r4", "invalid utf-8 sequence of 1 bytes from index 0");
        let err = parse(EntityKind::Rule, &record).unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::MalformedEntity));
        assert!(matches!(err, ItemError::MalformedEntity(ref m) if m.contains("not readable text")));
    }

    #[test]
    fn test_missing_conditions_is_malformed() {
        let data = json!({ "displayName": "No conditions" });
        let err = parse(EntityKind::DeviceGroup, &record("g", data.to_string())).unwrap_err();
        assert!(matches!(err, ItemError::MalformedEntity(ref m) if m.contains("conditions")));

        let data = json!({ "displayName": "Null conditions", "conditions": null });
        let err = parse(EntityKind::DeviceGroup, &record("g", data.to_string())).unwrap_err();
        assert!(matches!(err, ItemError::MalformedEntity(_)));
    }

    #[test]
    fn test_unknown_time_period_is_malformed() {
        let mut data = rule_json();
        data["timePeriod"] = json!(90000);
        let err = parse(EntityKind::Rule, &record("r", data.to_string())).unwrap_err();
        assert!(matches!(err, ItemError::MalformedEntity(ref m) if m.contains("timePeriod")));
    }

    #[test]
    fn test_unknown_action_type_is_malformed() {
        let mut data = rule_json();
        data["actions"] = json!([{ "type": "Webhook", "url": "http://example" }]);
        let err = parse(EntityKind::Rule, &record("r", data.to_string())).unwrap_err();
        assert!(matches!(err, ItemError::MalformedEntity(_)));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let mut data = rule_json();
        data["createdBy"] = json!("someone");
        data["conditions"][0]["unit"] = json!("celsius");
        assert!(parse(EntityKind::Rule, &record("r", data.to_string())).is_ok());
    }

    #[test]
    fn test_field_names_are_case_sensitive() {
        let data = json!({ "DisplayName": "Trucks", "Conditions": [] });
        let err = parse(EntityKind::DeviceGroup, &record("g", data.to_string())).unwrap_err();
        assert!(matches!(err, ItemError::MalformedEntity(_)));
    }

    #[test]
    fn test_semantic_validation() {
        let mut data = rule_json();
        data["name"] = json!("   ");
        assert!(matches!(
            parse(EntityKind::Rule, &record("r", data.to_string())),
            Err(ItemError::MalformedEntity(_))
        ));

        let mut data = rule_json();
        data["conditions"][0]["key"] = json!("");
        assert!(matches!(
            parse(EntityKind::Rule, &record("r", data.to_string())),
            Err(ItemError::MalformedEntity(_))
        ));

        let mut data = rule_json();
        data["actions"][0]["recipients"] = json!([]);
        assert!(matches!(
            parse(EntityKind::Rule, &record("r", data.to_string())),
            Err(ItemError::MalformedEntity(_))
        ));
    }

    #[test]
    fn test_wrong_kind_is_malformed() {
        let err = parse(
            EntityKind::DeviceGroup,
            &record("r1", rule_json().to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, ItemError::MalformedEntity(_)));
    }
}
