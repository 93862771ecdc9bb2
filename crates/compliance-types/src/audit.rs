//! Change journaling, entity versioning, and rollback request types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
    Enable,
    Disable,
    Deploy,
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// `old`/`new` side by side; empty when the values are equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diff {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

impl Diff {
    pub fn compute(old: &serde_json::Value, new: &serde_json::Value) -> Self {
        if old == new {
            return Diff::default();
        }
        Diff { old: old.clone(), new: new.clone() }
    }

    pub fn is_empty(&self) -> bool {
        self.old.is_null() && self.new.is_null()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub change_id: String,
    pub user_id: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub operation: ChangeOperation,
    pub impact: ImpactLevel,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub diff: Diff,
    pub reason: String,
    pub approval_ref: Option<String>,
    pub requires_approval: bool,
    pub approved: bool,
    pub metadata: HashMap<String, String>,
    pub changed_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub snapshot_id: String,
    pub entity_kind: String,
    pub entity_id: String,
    /// Monotone per `(entity_kind, entity_id)`.
    pub version_number: u64,
    pub state: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackStatus {
    Pending,
    Approved,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub rollback_id: String,
    pub requester: String,
    pub target_change_id: String,
    pub reason: String,
    pub dependent_change_ids: Vec<String>,
    pub requires_approval: bool,
    pub status: RollbackStatus,
    pub result: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_is_empty_when_values_equal() {
        let d = Diff::compute(&json!({"a": 1}), &json!({"a": 1}));
        assert!(d.is_empty());
    }

    #[test]
    fn diff_captures_both_sides_when_values_differ() {
        let d = Diff::compute(&json!({"a": 1}), &json!({"a": 2}));
        assert!(!d.is_empty());
        assert_eq!(d.old, json!({"a": 1}));
        assert_eq!(d.new, json!({"a": 2}));
    }
}
