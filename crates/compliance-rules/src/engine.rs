//! Rule Execution Engine. Grounded on `GateEngine`'s policy-cache shape
//! (async `RwLock<HashMap<..>>`, `Instant`-timed evaluation, a closing
//! `tracing::info!`) and `advanced_rule_engine.hpp`'s `RuleExecutionMode`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use compliance_audit::{AuditEngine, ChangeInput};
use compliance_errors::{ComplianceError, ErrorKind};
use compliance_store::StoreGateway;
use compliance_types::{
    ChangeOperation, FraudDetectionResult, Recommendation, RiskLevel, RuleDefinition,
    RuleExecutionResult, RuleKind, RuleOutcome, RulePerformanceMetrics,
};
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::evaluate::{confidence_for, evaluate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Synchronous,
    Asynchronous,
    Batch,
    Streaming,
}

const RULE_KIND: &str = "rule_definition";

/// Evaluates typed rules against an execution context, aggregates
/// per-transaction risk, and journals every rule-definition mutation through
/// the audit pillar.
pub struct RuleEngine {
    store: Arc<dyn StoreGateway>,
    audit: Arc<AuditEngine>,
    cache: RwLock<HashMap<String, RuleDefinition>>,
    metrics: Mutex<HashMap<String, RulePerformanceMetrics>>,
    max_parallel_executions: usize,
    default_timeout: Duration,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn StoreGateway>, audit: Arc<AuditEngine>) -> Self {
        Self {
            store,
            audit,
            cache: RwLock::new(HashMap::new()),
            metrics: Mutex::new(HashMap::new()),
            max_parallel_executions: 10,
            default_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_parallel_executions(mut self, n: usize) -> Self {
        self.max_parallel_executions = n;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Executes one rule against `context`; honors validity window, the
    /// active flag, and a hard wall-clock timeout.
    pub async fn execute_rule(&self, rule: &RuleDefinition, context: &Value, _mode: ExecutionMode) -> RuleExecutionResult {
        let start = Instant::now();
        let now = Utc::now();

        if !rule.active {
            return skipped(rule, start, "rule is inactive");
        }
        if !rule.in_validity_window(now) {
            return skipped(rule, start, "rule is outside its validity window");
        }

        let kind = rule.kind;
        let logic_tree = rule.logic_tree.clone();
        let context = context.clone();
        let evaluation = tokio::time::timeout(self.default_timeout, async move {
            tokio::task::spawn_blocking(move || evaluate(kind, &logic_tree, &context))
                .await
                .unwrap_or_else(|e| crate::evaluate::EvalOutcome {
                    outcome: RuleOutcome::Error,
                    output: Value::Null,
                    triggered: Vec::new(),
                    error_message: Some(e.to_string()),
                })
        })
        .await;

        let execution_duration_ms = start.elapsed().as_millis() as u64;

        let result = match evaluation {
            Ok(outcome) => {
                // ML rules always PASS with a fixed confidence, independent of priority.
                let confidence = if rule.kind == RuleKind::Ml { 0.5 } else { confidence_for(outcome.outcome, rule.priority.confidence_multiplier()) };
                RuleExecutionResult {
                    rule_id: rule.rule_id.clone(),
                    outcome: outcome.outcome,
                    confidence,
                    risk: RiskLevel::from_score(confidence),
                    output: outcome.output,
                    triggered_conditions: outcome.triggered,
                    error_message: outcome.error_message,
                    execution_duration_ms,
                }
            }
            Err(_) => RuleExecutionResult {
                rule_id: rule.rule_id.clone(),
                outcome: RuleOutcome::Timeout,
                confidence: 0.0,
                risk: RiskLevel::Low,
                output: Value::Null,
                triggered_conditions: Vec::new(),
                error_message: Some(format!("execution exceeded {:?}", self.default_timeout)),
                execution_duration_ms,
            },
        };

        self.record_execution(&result);
        tracing::info!(rule_id = %result.rule_id, outcome = ?result.outcome, confidence = result.confidence, duration_ms = result.execution_duration_ms, "rule executed");
        result
    }

    /// Loads the named rules (or all active rules), sorts by priority
    /// descending, executes up to `max_parallel_executions` concurrently,
    /// and aggregates into a `FraudDetectionResult`.
    pub async fn evaluate_transaction(&self, transaction_id: &str, context: &Value, rule_ids: Option<&[String]>) -> Result<FraudDetectionResult, ComplianceError> {
        let start = Instant::now();
        let rules = self.select_rules(rule_ids).await?;

        let per_rule_results: Vec<RuleExecutionResult> = stream::iter(rules)
            .map(|rule| async move { self.execute_rule(&rule, context, ExecutionMode::Synchronous).await })
            .buffer_unordered(self.max_parallel_executions.max(1))
            .collect()
            .await;

        let failing: Vec<&RuleExecutionResult> = per_rule_results.iter().filter(|r| r.outcome == RuleOutcome::Fail).collect();
        let is_flagged = !failing.is_empty();
        let fraud_score = if failing.is_empty() {
            0.0
        } else {
            let mean_confidence: f64 = failing.iter().map(|r| r.confidence).sum::<f64>() / failing.len() as f64;
            mean_confidence * (failing.len() as f64 / 5.0).min(1.0)
        };
        let overall_risk = RiskLevel::from_score(fraud_score);
        let recommendation = Recommendation::from_risk(is_flagged, overall_risk);

        let aggregated_findings = serde_json::json!({
            "failing_rule_ids": failing.iter().map(|r| r.rule_id.clone()).collect::<Vec<_>>(),
        });

        let detection = FraudDetectionResult {
            transaction_id: transaction_id.to_string(),
            is_flagged,
            overall_risk,
            fraud_score,
            per_rule_results,
            aggregated_findings,
            recommendation,
            detection_time: Utc::now(),
            processing_duration_ms: start.elapsed().as_millis() as u64,
        };

        self.store
            .put("fraud_detection_result", transaction_id, serde_json::to_value(&detection).map_err(|e| ComplianceError::new(ErrorKind::Processing, "compliance-rules", "evaluate_transaction", e.to_string()))?)
            .await?;

        Ok(detection)
    }

    async fn select_rules(&self, rule_ids: Option<&[String]>) -> Result<Vec<RuleDefinition>, ComplianceError> {
        let cache = self.cache.read().await;
        let mut rules: Vec<RuleDefinition> = match rule_ids {
            Some(ids) => ids.iter().filter_map(|id| cache.get(id).cloned()).collect(),
            None => cache.values().filter(|r| r.active).cloned().collect(),
        };
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        Ok(rules)
    }

    pub async fn register_rule(&self, user_id: &str, rule: RuleDefinition) -> Result<(), ComplianceError> {
        {
            let cache = self.cache.read().await;
            if cache.contains_key(&rule.rule_id) {
                return Err(ComplianceError::new(ErrorKind::Conflict, "compliance-rules", "register_rule", format!("rule {} already registered", rule.rule_id)));
            }
        }
        self.persist_rule(&rule).await?;
        self.audit
            .record_change(ChangeInput {
                user_id: user_id.to_string(),
                entity_kind: "rule".to_string(),
                entity_id: rule.rule_id.clone(),
                operation: ChangeOperation::Create,
                old_value: Value::Null,
                new_value: serde_json::to_value(&rule).unwrap_or(Value::Null),
                reason: "rule registered".to_string(),
                requires_approval: false,
            })
            .await?;
        self.cache.write().await.insert(rule.rule_id.clone(), rule);
        Ok(())
    }

    pub async fn update_rule(&self, user_id: &str, rule_id: &str, mut updated: RuleDefinition) -> Result<(), ComplianceError> {
        let previous = self.get_rule(rule_id).await?;
        updated.rule_id = rule_id.to_string();
        updated.created_at = previous.created_at;
        updated.updated_at = Utc::now();
        self.persist_rule(&updated).await?;
        self.audit
            .record_change(ChangeInput {
                user_id: user_id.to_string(),
                entity_kind: "rule".to_string(),
                entity_id: rule_id.to_string(),
                operation: ChangeOperation::Update,
                old_value: serde_json::to_value(&previous).unwrap_or(Value::Null),
                new_value: serde_json::to_value(&updated).unwrap_or(Value::Null),
                reason: "rule updated".to_string(),
                requires_approval: false,
            })
            .await?;
        self.cache.write().await.insert(rule_id.to_string(), updated);
        Ok(())
    }

    pub async fn deactivate_rule(&self, user_id: &str, rule_id: &str) -> Result<(), ComplianceError> {
        let mut rule = self.get_rule(rule_id).await?;
        let previous = rule.clone();
        rule.active = false;
        rule.updated_at = Utc::now();
        self.persist_rule(&rule).await?;
        self.audit
            .record_change(ChangeInput {
                user_id: user_id.to_string(),
                entity_kind: "rule".to_string(),
                entity_id: rule_id.to_string(),
                operation: ChangeOperation::Disable,
                old_value: serde_json::to_value(&previous).unwrap_or(Value::Null),
                new_value: serde_json::to_value(&rule).unwrap_or(Value::Null),
                reason: "rule deactivated".to_string(),
                requires_approval: false,
            })
            .await?;
        self.cache.write().await.insert(rule_id.to_string(), rule);
        Ok(())
    }

    pub async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<(), ComplianceError> {
        let previous = self.get_rule(rule_id).await?;
        self.store.delete(RULE_KIND, rule_id).await?;
        self.audit
            .record_change(ChangeInput {
                user_id: user_id.to_string(),
                entity_kind: "rule".to_string(),
                entity_id: rule_id.to_string(),
                operation: ChangeOperation::Delete,
                old_value: serde_json::to_value(&previous).unwrap_or(Value::Null),
                new_value: Value::Null,
                reason: "rule deleted".to_string(),
                requires_approval: true,
            })
            .await?;
        self.cache.write().await.remove(rule_id);
        Ok(())
    }

    pub async fn get_rule(&self, rule_id: &str) -> Result<RuleDefinition, ComplianceError> {
        self.cache
            .read()
            .await
            .get(rule_id)
            .cloned()
            .ok_or_else(|| ComplianceError::new(ErrorKind::NotFound, "compliance-rules", "get_rule", format!("no rule {rule_id}")))
    }

    pub async fn get_active_rules(&self) -> Vec<RuleDefinition> {
        self.cache.read().await.values().filter(|r| r.active).cloned().collect()
    }

    pub async fn get_rules_by_kind(&self, kind: RuleKind) -> Vec<RuleDefinition> {
        self.cache.read().await.values().filter(|r| r.kind == kind).cloned().collect()
    }

    /// Refreshes the in-memory cache from the store, replacing the prior
    /// contents atomically.
    pub async fn reload_rules(&self) -> Result<(), ComplianceError> {
        let rows = self.store.list(RULE_KIND).await?;
        let mut fresh = HashMap::with_capacity(rows.len());
        for (key, value) in rows {
            let rule: RuleDefinition = serde_json::from_value(value).map_err(|e| ComplianceError::new(ErrorKind::Processing, "compliance-rules", "reload_rules", e.to_string()))?;
            fresh.insert(key, rule);
        }
        *self.cache.write().await = fresh;
        Ok(())
    }

    pub fn get_rule_metrics(&self, rule_id: &str) -> RulePerformanceMetrics {
        self.metrics.lock().get(rule_id).cloned().unwrap_or_else(|| RulePerformanceMetrics { rule_id: rule_id.to_string(), ..RulePerformanceMetrics::default() })
    }

    fn record_execution(&self, result: &RuleExecutionResult) {
        let mut metrics = self.metrics.lock();
        let entry = metrics.entry(result.rule_id.clone()).or_insert_with(|| RulePerformanceMetrics { rule_id: result.rule_id.clone(), ..RulePerformanceMetrics::default() });
        entry.executions += 1;
        match result.outcome {
            RuleOutcome::Pass => entry.successes += 1,
            RuleOutcome::Fail => {
                entry.failures += 1;
                entry.detections += 1;
            }
            RuleOutcome::Error | RuleOutcome::Timeout => entry.failures += 1,
            RuleOutcome::Skipped => {}
        }
        if let Some(err) = &result.error_message {
            *entry.error_counts.entry(err.clone()).or_insert(0) += 1;
        }
        let n = entry.executions as f64;
        entry.avg_duration_ms = ((entry.avg_duration_ms * (n - 1.0)) + result.execution_duration_ms as f64) / n;
        entry.avg_confidence = ((entry.avg_confidence * (n - 1.0)) + result.confidence) / n;
        entry.last_execution = Some(Utc::now());
    }

    async fn persist_rule(&self, rule: &RuleDefinition) -> Result<(), ComplianceError> {
        let value = serde_json::to_value(rule).map_err(|e| ComplianceError::new(ErrorKind::Processing, "compliance-rules", "persist_rule", e.to_string()))?;
        self.store.put(RULE_KIND, &rule.rule_id, value).await
    }
}

fn skipped(rule: &RuleDefinition, start: Instant, reason: &str) -> RuleExecutionResult {
    RuleExecutionResult {
        rule_id: rule.rule_id.clone(),
        outcome: RuleOutcome::Skipped,
        confidence: 0.0,
        risk: RiskLevel::Low,
        output: Value::Null,
        triggered_conditions: Vec::new(),
        error_message: Some(reason.to_string()),
        execution_duration_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_audit::AuditEngine;
    use compliance_store::InMemoryStore;
    use compliance_types::{LogicTree, RulePriority};
    use serde_json::json;

    fn validation_rule(id: &str) -> RuleDefinition {
        RuleDefinition::new(
            id,
            "amount under limit",
            RulePriority::Critical,
            RuleKind::Validation,
            LogicTree { conditions: vec![json!({"field": "amount", "operator": "less_than", "value": 1000, "description": "amount under limit"})], ..LogicTree::default() },
        )
    }

    fn engine() -> RuleEngine {
        let store = Arc::new(InMemoryStore::new());
        let audit = Arc::new(AuditEngine::new(store.clone()));
        RuleEngine::new(store, audit)
    }

    #[tokio::test]
    async fn single_rule_pass_scenario() {
        let engine = engine();
        let rule = validation_rule("r1");
        let result = engine.execute_rule(&rule, &json!({"amount": 10}), ExecutionMode::Synchronous).await;
        assert_eq!(result.outcome, RuleOutcome::Pass);
    }

    #[tokio::test]
    async fn inactive_rule_is_skipped() {
        let engine = engine();
        let mut rule = validation_rule("r1");
        rule.active = false;
        let result = engine.execute_rule(&rule, &json!({"amount": 10}), ExecutionMode::Synchronous).await;
        assert_eq!(result.outcome, RuleOutcome::Skipped);
    }

    #[tokio::test]
    async fn register_then_evaluate_transaction_aggregates_fail() {
        let engine = engine();
        for i in 0..5 {
            engine.register_rule("u1", validation_rule(&format!("r{i}"))).await.unwrap();
        }
        let detection = engine.evaluate_transaction("txn-1", &json!({"amount": 5000}), None).await.unwrap();
        assert!(detection.is_flagged);
        assert_eq!(detection.per_rule_results.len(), 5);
        // 5 CRITICAL validation failures: mean confidence 0.8 * min(1, 5/5) = 0.8 -> CRITICAL -> BLOCK.
        assert_eq!(detection.recommendation, Recommendation::Block);
    }

    #[tokio::test]
    async fn three_critical_failures_aggregate_to_medium_review() {
        let engine = engine();
        for i in 0..3 {
            engine.register_rule("u1", validation_rule(&format!("r{i}"))).await.unwrap();
        }
        let detection = engine.evaluate_transaction("txn-2", &json!({"amount": 1_000_000, "country": "XX"}), None).await.unwrap();
        assert!(detection.is_flagged);
        // 3 CRITICAL failures: mean confidence 0.8 * min(1, 3/5) = 0.48 -> MEDIUM -> REVIEW.
        assert!((detection.fraud_score - 0.48).abs() < 1e-9);
        assert_eq!(detection.overall_risk, RiskLevel::Medium);
        assert_eq!(detection.recommendation, Recommendation::Review);
    }

    #[tokio::test]
    async fn ml_rule_always_has_fixed_confidence_regardless_of_priority() {
        let engine = engine();
        let rule = RuleDefinition::new("r1", "ml rule", RulePriority::Critical, RuleKind::Ml, LogicTree::default());
        let result = engine.execute_rule(&rule, &json!({}), ExecutionMode::Synchronous).await;
        assert_eq!(result.outcome, RuleOutcome::Pass);
        assert!((result.confidence - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn delete_rule_requires_journal_and_removes_from_cache() {
        let engine = engine();
        engine.register_rule("u1", validation_rule("r1")).await.unwrap();
        engine.delete_rule("u1", "r1").await.unwrap();
        assert!(engine.get_rule("r1").await.is_err());
    }

    #[tokio::test]
    async fn reload_rules_replaces_cache_from_store() {
        let engine = engine();
        engine.register_rule("u1", validation_rule("r1")).await.unwrap();
        engine.cache.write().await.clear();
        engine.reload_rules().await.unwrap();
        assert!(engine.get_rule("r1").await.is_ok());
    }
}
