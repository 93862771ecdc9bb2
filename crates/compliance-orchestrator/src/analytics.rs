//! Decision/learning analytics, dropped by the distillation but present in
//! `original_source/shared/analytics/{learning_insights,decision_analytics}
//! .hpp`: read-only aggregation over the `(timestamp, success)` samples the
//! orchestrator already records per agent for routing, bucketed by agent and
//! by hour. No new mutation path.

use std::collections::HashMap;

use serde::Serialize;

use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Default, Serialize)]
pub struct HourlyBucket {
    pub hour_epoch: u64,
    pub success: u64,
    pub failure: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentDecisionAnalytics {
    pub agent_type: String,
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub hourly: Vec<HourlyBucket>,
}

const SECONDS_PER_HOUR: u64 = 3_600;

/// Aggregates recorded task outcomes for `agent_type` (or every agent, if
/// `None`) over the last `days` days.
pub fn get_decision_analytics(orchestrator: &Orchestrator, agent_type: Option<&str>, days: i64) -> Vec<AgentDecisionAnalytics> {
    let now = chrono::Utc::now().timestamp() as u64;
    let window_start = now.saturating_sub((days.max(0) as u64) * 24 * SECONDS_PER_HOUR);

    let samples = orchestrator.samples_snapshot();
    let mut out = Vec::new();
    for (candidate, series) in samples {
        if let Some(filter) = agent_type {
            if candidate != filter {
                continue;
            }
        }
        let mut buckets: HashMap<u64, HourlyBucket> = HashMap::new();
        let mut success = 0u64;
        let mut failure = 0u64;
        for (timestamp, ok) in series.into_iter().filter(|(ts, _)| *ts >= window_start) {
            let hour_epoch = timestamp - (timestamp % SECONDS_PER_HOUR);
            let bucket = buckets.entry(hour_epoch).or_insert_with(|| HourlyBucket { hour_epoch, ..Default::default() });
            if ok {
                bucket.success += 1;
                success += 1;
            } else {
                bucket.failure += 1;
                failure += 1;
            }
        }
        let mut hourly: Vec<HourlyBucket> = buckets.into_values().collect();
        hourly.sort_by_key(|b| b.hour_epoch);
        out.push(AgentDecisionAnalytics { agent_type: candidate, total: success + failure, success, failure, hourly });
    }
    out.sort_by(|a, b| a.agent_type.cmp(&b.agent_type));
    out
}
