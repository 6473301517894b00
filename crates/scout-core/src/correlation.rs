//! Correlation identifiers tying replies to the probe that caused them

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use uuid::Uuid;

/// Opaque token carried as `MessageID` in a probe and echoed back as
/// `RelatesTo` by every device answering it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Generate a fresh identifier in the `uuid:<v4>` form devices expect
    pub fn generate() -> Self {
        Self(format!("uuid:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// Lets the correlator look up awaited ids by the raw `RelatesTo` text.
impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_uses_uuid_urn_form() {
        let id = CorrelationId::generate();
        let raw = id.as_str().strip_prefix("uuid:").unwrap();
        assert!(Uuid::parse_str(raw).is_ok());
    }

    #[test]
    fn test_generate_is_unique() {
        let ids: HashSet<CorrelationId> = (0..1000).map(|_| CorrelationId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_lookup_by_str() {
        let id = CorrelationId::generate();
        let raw = id.as_str().to_string();
        let set: HashSet<CorrelationId> = [id].into_iter().collect();
        assert!(set.contains(raw.as_str()));
        assert!(!set.contains("uuid:00000000-0000-0000-0000-000000000000"));
    }
}
