//! Benchmarks `RuleEngine::evaluate_transaction` under a realistic rule set,
//! mirroring the teacher's `policy_eval` benchmark shape.

use std::sync::Arc;

use compliance_audit::AuditEngine;
use compliance_rules::RuleEngine;
use compliance_store::InMemoryStore;
use compliance_types::{LogicTree, RuleDefinition, RuleKind, RulePriority};
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use tokio::runtime::Runtime;

fn build_engine(rule_count: usize) -> RuleEngine {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let audit = Arc::new(AuditEngine::new(store.clone()));
    let engine = RuleEngine::new(store, audit);
    rt.block_on(async {
        for i in 0..rule_count {
            let rule = RuleDefinition::new(
                format!("r{i}"),
                "amount under limit",
                RulePriority::Medium,
                RuleKind::Validation,
                LogicTree { conditions: vec![json!({"field": "amount", "operator": "less_than", "value": 1000})], ..LogicTree::default() },
            );
            engine.register_rule("bench", rule).await.unwrap();
        }
    });
    engine
}

fn bench_evaluate_transaction(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = build_engine(50);
    c.bench_function("evaluate_transaction_50_rules", |b| {
        b.iter(|| rt.block_on(engine.evaluate_transaction("txn", &json!({"amount": 5000}), None)).unwrap())
    });
}

criterion_group!(benches, bench_evaluate_transaction);
criterion_main!(benches);
