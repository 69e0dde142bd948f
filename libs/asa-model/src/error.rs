//! Per-item error kinds

use thiserror::Error;

use crate::export::FailureKind;

/// Error raised while converting a single value record
///
/// None of these abort a batch; the orchestrator decides between "skipped"
/// and "failed" by matching on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// Payload is null, empty or whitespace-only
    #[error("Blank content")]
    BlankContent,

    /// Payload is not valid JSON or does not match the entity shape
    #[error("Malformed entity: {0}")]
    MalformedEntity(String),

    /// Device registry could not resolve the group's devices
    #[error("Device registry dependency error: {0}")]
    RegistryDependency(String),
}

impl ItemError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ItemError::MalformedEntity(msg.into())
    }

    /// Failure classification, `None` for items that are skipped instead
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ItemError::BlankContent => None,
            ItemError::MalformedEntity(_) => Some(FailureKind::MalformedEntity),
            ItemError::RegistryDependency(_) => Some(FailureKind::RegistryDependencyError),
        }
    }

    /// Human-readable detail without the kind prefix
    pub fn detail(&self) -> &str {
        match self {
            ItemError::BlankContent => "payload is blank",
            ItemError::MalformedEntity(msg) | ItemError::RegistryDependency(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind() {
        assert_eq!(ItemError::BlankContent.failure_kind(), None);
        assert_eq!(
            ItemError::malformed("bad").failure_kind(),
            Some(FailureKind::MalformedEntity)
        );
        assert_eq!(
            ItemError::RegistryDependency("timeout".to_string()).failure_kind(),
            Some(FailureKind::RegistryDependencyError)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ItemError::malformed("missing field `conditions`").to_string(),
            "Malformed entity: missing field `conditions`"
        );
        assert_eq!(ItemError::BlankContent.detail(), "payload is blank");
    }
}
