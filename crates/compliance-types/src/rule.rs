//! Rule definitions, execution results, and transaction-level aggregation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl RulePriority {
    /// `priority_rank / 4`: CRITICAL = 1.0, LOW = 0.25.
    pub fn confidence_multiplier(self) -> f64 {
        match self {
            RulePriority::Low => 0.25,
            RulePriority::Medium => 0.5,
            RulePriority::High => 0.75,
            RulePriority::Critical => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    Validation,
    Scoring,
    Pattern,
    Ml,
}

/// Opaque rule logic; the rule engine interprets `conditions`,
/// `scoring_factors`/`threshold`, or `patterns` depending on `RuleKind`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicTree {
    pub conditions: Vec<serde_json::Value>,
    pub scoring_factors: Vec<serde_json::Value>,
    pub threshold: Option<f64>,
    pub patterns: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub rule_id: String,
    pub name: String,
    pub priority: RulePriority,
    pub kind: RuleKind,
    pub logic_tree: LogicTree,
    pub parameters: serde_json::Value,
    pub input_fields: Vec<String>,
    pub output_fields: Vec<String>,
    pub active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleDefinition {
    pub fn new(rule_id: impl Into<String>, name: impl Into<String>, priority: RulePriority, kind: RuleKind, logic_tree: LogicTree) -> Self {
        let now = Utc::now();
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            priority,
            kind,
            logic_tree,
            parameters: serde_json::Value::Null,
            input_fields: Vec::new(),
            output_fields: Vec::new(),
            active: true,
            valid_from: None,
            valid_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `valid_until < now` never fires (spec.md §3 Rule Definition invariant).
    pub fn in_validity_window(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if now > until {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOutcome {
    Pass,
    Fail,
    Error,
    Timeout,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// `>=0.8` CRITICAL, `>=0.6` HIGH, `>=0.4` MEDIUM, else LOW.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            RiskLevel::Critical
        } else if score >= 0.6 {
            RiskLevel::High
        } else if score >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecutionResult {
    pub rule_id: String,
    pub outcome: RuleOutcome,
    pub confidence: f64,
    pub risk: RiskLevel,
    pub output: serde_json::Value,
    pub triggered_conditions: Vec<String>,
    pub error_message: Option<String>,
    pub execution_duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Approve,
    Review,
    Block,
}

impl Recommendation {
    pub fn from_risk(is_flagged: bool, risk: RiskLevel) -> Self {
        if !is_flagged {
            return Recommendation::Approve;
        }
        match risk {
            RiskLevel::Critical => Recommendation::Block,
            RiskLevel::High | RiskLevel::Medium => Recommendation::Review,
            RiskLevel::Low => Recommendation::Approve,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudDetectionResult {
    pub transaction_id: String,
    pub is_flagged: bool,
    pub overall_risk: RiskLevel,
    pub fraud_score: f64,
    pub per_rule_results: Vec<RuleExecutionResult>,
    pub aggregated_findings: serde_json::Value,
    pub recommendation: Recommendation,
    pub detection_time: DateTime<Utc>,
    /// Resolves the spec.md §9 open question in favor of a plain integer.
    pub processing_duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePerformanceMetrics {
    pub rule_id: String,
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub detections: u64,
    pub avg_duration_ms: f64,
    pub avg_confidence: f64,
    pub last_execution: Option<DateTime<Utc>>,
    pub error_counts: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_thresholds_are_inclusive_lower_bound() {
        assert_eq!(RiskLevel::from_score(0.8), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(0.79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
    }

    #[test]
    fn recommendation_is_monotone_in_risk() {
        assert_eq!(Recommendation::from_risk(false, RiskLevel::Critical), Recommendation::Approve);
        assert_eq!(Recommendation::from_risk(true, RiskLevel::Critical), Recommendation::Block);
        assert_eq!(Recommendation::from_risk(true, RiskLevel::High), Recommendation::Review);
        assert_eq!(Recommendation::from_risk(true, RiskLevel::Medium), Recommendation::Review);
        assert_eq!(Recommendation::from_risk(true, RiskLevel::Low), Recommendation::Approve);
    }
}
