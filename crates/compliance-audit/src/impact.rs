//! Deterministic, pure impact inference given `(entity_kind, operation, diff)`
//! (spec.md §4.5 "Impact inference is deterministic and pure").

use compliance_types::{ChangeOperation, Diff, ImpactLevel};

pub fn infer_impact(entity_kind: &str, operation: ChangeOperation, diff: &Diff) -> ImpactLevel {
    let _ = diff;
    if operation == ChangeOperation::Delete {
        return ImpactLevel::Critical;
    }
    let kind = entity_kind.to_ascii_lowercase();
    if kind.contains("policy") {
        ImpactLevel::High
    } else if kind.contains("rule") {
        ImpactLevel::Medium
    } else {
        ImpactLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delete_is_always_critical() {
        let diff = Diff::compute(&json!({"a": 1}), &json!(null));
        assert_eq!(infer_impact("rule", ChangeOperation::Delete, &diff), ImpactLevel::Critical);
    }

    #[test]
    fn policy_edit_is_high() {
        let diff = Diff::compute(&json!(1), &json!(2));
        assert_eq!(infer_impact("policy", ChangeOperation::Update, &diff), ImpactLevel::High);
    }

    #[test]
    fn rule_edit_is_medium() {
        let diff = Diff::compute(&json!(1), &json!(2));
        assert_eq!(infer_impact("rule_definition", ChangeOperation::Update, &diff), ImpactLevel::Medium);
    }

    #[test]
    fn other_entities_default_to_low() {
        let diff = Diff::compute(&json!(1), &json!(2));
        assert_eq!(infer_impact("websocket_connection", ChangeOperation::Create, &diff), ImpactLevel::Low);
    }
}
