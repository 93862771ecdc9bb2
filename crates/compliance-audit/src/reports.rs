//! Structured report rendering (spec.md §4.5 "Reports"). No PDF/bulk
//! document output — out of scope per spec.md §1 — these render as
//! `serde_json::Value` documents the caller can serialize or embed.

use chrono::Utc;
use compliance_errors::ComplianceError;
use compliance_types::{ChangeRecord, ImpactLevel};
use serde_json::{json, Value};

fn within_window(changes: &[ChangeRecord], days: i64) -> Vec<&ChangeRecord> {
    let cutoff = Utc::now() - chrono::Duration::days(days);
    changes.iter().filter(|c| c.changed_at >= cutoff).collect()
}

pub fn audit_report(changes: &[ChangeRecord], days: i64, entity_kind: Option<&str>) -> Result<Value, ComplianceError> {
    let windowed: Vec<&ChangeRecord> = within_window(changes, days)
        .into_iter()
        .filter(|c| entity_kind.map(|k| c.entity_kind == k).unwrap_or(true))
        .collect();

    let approved = windowed.iter().filter(|c| c.approved).count();
    let pending_approval = windowed.iter().filter(|c| c.requires_approval && !c.approved).count();

    Ok(json!({
        "report_type": "audit_report",
        "period_days": days,
        "entity_kind": entity_kind,
        "total_changes": windowed.len(),
        "approved_changes": approved,
        "pending_approval": pending_approval,
        "generated_at": Utc::now().to_rfc3339(),
    }))
}

pub fn compliance_certification(changes: &[ChangeRecord], days: i64) -> Result<Value, ComplianceError> {
    let windowed = within_window(changes, days);
    let unapproved_high_impact = windowed
        .iter()
        .filter(|c| matches!(c.impact, ImpactLevel::High | ImpactLevel::Critical) && !c.approved)
        .count();

    Ok(json!({
        "report_type": "compliance_certification",
        "period_days": days,
        "total_changes": windowed.len(),
        "unapproved_high_impact_changes": unapproved_high_impact,
        "certified": unapproved_high_impact == 0,
        "generated_at": Utc::now().to_rfc3339(),
    }))
}

pub fn soc2_report(changes: &[ChangeRecord], days: i64) -> Result<Value, ComplianceError> {
    let windowed = within_window(changes, days);
    let mut by_operation: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();
    for c in &windowed {
        *by_operation.entry(format!("{:?}", c.operation)).or_insert(0) += 1;
    }

    Ok(json!({
        "report_type": "soc2_report",
        "period_days": days,
        "total_changes": windowed.len(),
        "changes_by_operation": by_operation,
        "generated_at": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_types::{ChangeOperation, Diff};
    use serde_json::json as j;

    fn change(impact: ImpactLevel, approved: bool) -> ChangeRecord {
        ChangeRecord {
            change_id: "c1".into(),
            user_id: "u1".into(),
            entity_kind: "rule".into(),
            entity_id: "r1".into(),
            operation: ChangeOperation::Update,
            impact,
            old_value: j!(1),
            new_value: j!(2),
            diff: Diff::compute(&j!(1), &j!(2)),
            reason: "test".into(),
            approval_ref: None,
            requires_approval: true,
            approved,
            metadata: Default::default(),
            changed_at: Utc::now(),
            approved_at: None,
        }
    }

    #[test]
    fn certification_fails_with_unapproved_high_impact_changes() {
        let changes = vec![change(ImpactLevel::High, false)];
        let cert = compliance_certification(&changes, 30).unwrap();
        assert_eq!(cert["certified"], j!(false));
    }

    #[test]
    fn certification_passes_when_all_high_impact_approved() {
        let changes = vec![change(ImpactLevel::High, true)];
        let cert = compliance_certification(&changes, 30).unwrap();
        assert_eq!(cert["certified"], j!(true));
    }
}
