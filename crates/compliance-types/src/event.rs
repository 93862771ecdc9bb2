//! Compliance events: the immutable input the fleet reacts to.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse classification of what an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    RegulatoryChange,
    Transaction,
    HealthCheck,
    AgentSignal,
    ConsensusRequest,
}

/// Severity tag carried alongside every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// A typed, severity-tagged, timestamped record describing a regulatory
/// change, transaction, or health ping. Immutable once created: every field
/// is set at construction time, no setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceEvent {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub severity: Severity,
    pub source_system: String,
    pub occurred_at: DateTime<Utc>,
    /// Free-form payload; rule evaluation reads dotted paths into this.
    pub data: serde_json::Value,
    pub metadata: HashMap<String, String>,
}

impl ComplianceEvent {
    pub fn new(kind: EventKind, severity: Severity, source_system: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            severity,
            source_system: source_system.into(),
            occurred_at: Utc::now(),
            data: serde_json::Value::Null,
            metadata: HashMap::new(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Resolve a dotted field path (`"a.b.c"`) against `self.data`.
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        let mut cursor = &self.data;
        for segment in path.split('.') {
            cursor = cursor.get(segment)?;
        }
        Some(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_field_lookup() {
        let event = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "core-banking")
            .with_data(json!({"amount": 500, "customer": {"country": "US"}}));

        assert_eq!(event.field("amount"), Some(&json!(500)));
        assert_eq!(event.field("customer.country"), Some(&json!("US")));
        assert_eq!(event.field("customer.missing"), None);
    }
}
