//! Golden tests for the Rule Execution Engine's end-to-end evaluation
//! scenarios. These lock in the rule-evaluation/aggregation contract and
//! must not change without explicit review, mirroring the teacher's
//! `tests/golden_policy_eval.rs` characterization tests.

use std::sync::Arc;

use compliance_audit::AuditEngine;
use compliance_rules::RuleEngine;
use compliance_store::InMemoryStore;
use compliance_types::{LogicTree, Recommendation, RiskLevel, RuleDefinition, RuleKind, RulePriority};
use serde_json::json;

fn engine_fixture() -> RuleEngine {
    let store = Arc::new(InMemoryStore::new());
    let audit = Arc::new(AuditEngine::new(store.clone()));
    RuleEngine::new(store, audit)
}

fn validation_rule(id: &str, priority: RulePriority) -> RuleDefinition {
    RuleDefinition::new(
        id,
        "amount under limit",
        priority,
        RuleKind::Validation,
        LogicTree { conditions: vec![json!({"field": "amount", "operator": "less_than", "value": 1000})], ..LogicTree::default() },
    )
}

fn scoring_rule(id: &str, priority: RulePriority) -> RuleDefinition {
    RuleDefinition::new(
        id,
        "amount scoring",
        priority,
        RuleKind::Scoring,
        LogicTree { scoring_factors: vec![json!({"field": "amount", "weight": 10.0, "operation": "exists"})], threshold: Some(0.4), ..LogicTree::default() },
    )
}

/// Scenario 1: single-rule PASS.
#[tokio::test]
async fn golden_single_rule_pass() {
    let engine = engine_fixture();
    engine.register_rule("u1", validation_rule("r1", RulePriority::Critical)).await.unwrap();

    let detection = engine.evaluate_transaction("txn-1", &json!({"amount": 500}), None).await.unwrap();

    assert!(!detection.is_flagged);
    assert_eq!(detection.fraud_score, 0.0);
    assert_eq!(detection.recommendation, Recommendation::Approve);
    assert_eq!(detection.per_rule_results.len(), 1);
    assert_eq!(detection.per_rule_results[0].outcome, compliance_types::RuleOutcome::Pass);
    // confidence = 0.2 * CRITICAL's multiplier (1.0).
    assert!((detection.per_rule_results[0].confidence - 0.2).abs() < 1e-9);
}

/// Scenario 2: aggregated FAIL -> REVIEW at 3 failing CRITICAL rules, and
/// BLOCK once enough failing rules push the aggregated score to CRITICAL.
#[tokio::test]
async fn golden_aggregated_fail_drives_review_then_block() {
    let engine = engine_fixture();
    for i in 0..3 {
        engine.register_rule("u1", scoring_rule(&format!("r{i}"), RulePriority::Critical)).await.unwrap();
    }
    let detection = engine.evaluate_transaction("txn-2", &json!({"amount": 1_000_000, "country": "XX"}), None).await.unwrap();
    assert!(detection.is_flagged);
    // 3 CRITICAL FAILs: mean confidence 0.8 * min(1, 3/5) = 0.48 -> MEDIUM -> REVIEW.
    assert!((detection.fraud_score - 0.48).abs() < 1e-9);
    assert_eq!(detection.overall_risk, RiskLevel::Medium);
    assert_eq!(detection.recommendation, Recommendation::Review);

    let engine = engine_fixture();
    for i in 0..5 {
        engine.register_rule("u1", scoring_rule(&format!("r{i}"), RulePriority::Critical)).await.unwrap();
    }
    let detection = engine.evaluate_transaction("txn-3", &json!({"amount": 1_000_000, "country": "XX"}), None).await.unwrap();
    // 5 CRITICAL FAILs: mean confidence 0.8 * min(1, 5/5) = 0.8 -> CRITICAL -> BLOCK.
    assert!((detection.fraud_score - 0.8).abs() < 1e-9);
    assert_eq!(detection.overall_risk, RiskLevel::Critical);
    assert_eq!(detection.recommendation, Recommendation::Block);
}
