//! Kind-specific rule evaluation (spec.md §4.2 "Rule kinds"). Every function
//! here is pure: given a logic tree and a context, it returns an outcome,
//! output document, and triggered-condition list. The engine wraps these
//! with timing, timeout, and persistence.

use compliance_types::{LogicTree, RuleKind, RuleOutcome};
use regex::Regex;
use serde_json::{json, Value};

/// Resolves a dotted field path (`"customer.country"`) against a JSON
/// context, mirroring `ComplianceEvent::field`'s lookup but over a plain
/// `Value` rather than an event envelope.
pub fn field<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cursor = context;
    for segment in path.split('.') {
        cursor = cursor.get(segment)?;
    }
    Some(cursor)
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

pub struct EvalOutcome {
    pub outcome: RuleOutcome,
    pub output: Value,
    pub triggered: Vec<String>,
    pub error_message: Option<String>,
}

pub fn evaluate(kind: RuleKind, logic_tree: &LogicTree, context: &Value) -> EvalOutcome {
    match kind {
        RuleKind::Validation => evaluate_validation(logic_tree, context),
        RuleKind::Scoring => evaluate_scoring(logic_tree, context),
        RuleKind::Pattern => evaluate_pattern(logic_tree, context),
        RuleKind::Ml => evaluate_ml(),
    }
}

fn evaluate_validation(logic_tree: &LogicTree, context: &Value) -> EvalOutcome {
    let mut failed = Vec::new();
    for condition in &logic_tree.conditions {
        let field_path = condition.get("field").and_then(Value::as_str).unwrap_or_default();
        let operator = condition.get("operator").and_then(Value::as_str).unwrap_or_default();
        let expected = condition.get("value").cloned().unwrap_or(Value::Null);
        let description = condition
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{field_path} {operator} {expected}"));

        let actual = field(context, field_path);
        let holds = match operator {
            "equals" => actual == Some(&expected),
            "not_equals" => actual != Some(&expected),
            "greater_than" => match (actual.and_then(as_f64), as_f64(&expected)) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            "less_than" => match (actual.and_then(as_f64), as_f64(&expected)) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
            "contains" => match actual {
                Some(Value::String(s)) => expected.as_str().map(|e| s.contains(e)).unwrap_or(false),
                Some(Value::Array(items)) => items.contains(&expected),
                _ => false,
            },
            "exists" => actual.is_some(),
            _ => false,
        };

        if !holds {
            failed.push(description);
        }
    }

    if failed.is_empty() {
        EvalOutcome { outcome: RuleOutcome::Pass, output: json!({"conditions_evaluated": logic_tree.conditions.len()}), triggered: Vec::new(), error_message: None }
    } else {
        let output = json!({"failed_conditions": failed});
        EvalOutcome { outcome: RuleOutcome::Fail, triggered: failed, output, error_message: None }
    }
}

fn evaluate_scoring(logic_tree: &LogicTree, context: &Value) -> EvalOutcome {
    let mut raw_score: f64 = 0.0;
    let mut contributions = Vec::new();

    for factor in &logic_tree.scoring_factors {
        let field_path = factor.get("field").and_then(Value::as_str).unwrap_or_default();
        let weight = factor.get("weight").and_then(Value::as_f64).unwrap_or(0.0);
        let operation = factor.get("operation").and_then(Value::as_str).unwrap_or_default();
        let actual = field(context, field_path);

        let contribution = match operation {
            "exists" if actual.is_some() => weight,
            "exists" => 0.0,
            "value" => actual.and_then(as_f64).map(|v| weight * v).unwrap_or(0.0),
            "threshold" => {
                let threshold = factor.get("threshold").and_then(Value::as_f64).unwrap_or(0.0);
                match actual.and_then(as_f64) {
                    Some(v) if v >= threshold => weight,
                    _ => 0.0,
                }
            }
            _ => 0.0,
        };

        raw_score += contribution;
        contributions.push(json!({"field": field_path, "operation": operation, "contribution": contribution}));
    }

    let normalized = 1.0 / (1.0 + (-raw_score).exp());
    let threshold = logic_tree.threshold.unwrap_or(0.5);
    let output = json!({"raw_score": raw_score, "normalized_score": normalized, "threshold": threshold, "contributions": contributions});

    if normalized >= threshold {
        EvalOutcome { outcome: RuleOutcome::Fail, output, triggered: vec!["scoring_threshold_exceeded".to_string()], error_message: None }
    } else {
        EvalOutcome { outcome: RuleOutcome::Pass, output, triggered: Vec::new(), error_message: None }
    }
}

fn evaluate_pattern(logic_tree: &LogicTree, context: &Value) -> EvalOutcome {
    let mut matches = Vec::new();

    for pattern in &logic_tree.patterns {
        let field_path = pattern.get("field").and_then(Value::as_str).unwrap_or_default();
        let pattern_kind = pattern.get("kind").and_then(Value::as_str).unwrap_or_default();
        let Some(actual) = field(context, field_path) else { continue };

        let matched = match pattern_kind {
            "regex" => {
                let expr = pattern.get("pattern").and_then(Value::as_str).unwrap_or_default();
                actual.as_str().and_then(|s| Regex::new(expr).ok().map(|re| re.is_match(s))).unwrap_or(false)
            }
            "value_list" => {
                let values = pattern.get("values").and_then(Value::as_array).cloned().unwrap_or_default();
                values.contains(actual)
            }
            _ => false,
        };

        if matched {
            matches.push(format!("{field_path}:{pattern_kind}"));
        }
    }

    if matches.is_empty() {
        EvalOutcome { outcome: RuleOutcome::Pass, output: json!({"matches": Vec::<String>::new()}), triggered: Vec::new(), error_message: None }
    } else {
        let output = json!({"matches": matches});
        EvalOutcome { outcome: RuleOutcome::Fail, triggered: matches, output, error_message: None }
    }
}

fn evaluate_ml() -> EvalOutcome {
    EvalOutcome {
        outcome: RuleOutcome::Pass,
        output: Value::Null,
        triggered: Vec::new(),
        error_message: Some("ML rule kind is a placeholder; no inference backend configured".to_string()),
    }
}

/// `base(outcome) * priority.confidence_multiplier()`, capped at 1
/// (spec.md §4.2 "Confidence").
pub fn confidence_for(outcome: RuleOutcome, priority_multiplier: f64) -> f64 {
    let base = match outcome {
        RuleOutcome::Fail => 0.8,
        RuleOutcome::Pass => 0.2,
        _ => 0.5,
    };
    (base * priority_multiplier).min(1.0)
}
