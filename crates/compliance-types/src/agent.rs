//! Agent tasks, registration, capabilities and status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{ComplianceEvent, EventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    /// `CRITICAL = 1.0 ... LOW = 0.25`, used by the rule engine's confidence
    /// formula and nowhere else — kept here since it's a pure function of the
    /// enum, not engine state.
    pub fn rank(self) -> f64 {
        match self {
            TaskPriority::Low => 1.0,
            TaskPriority::Normal => 2.0,
            TaskPriority::High => 3.0,
            TaskPriority::Critical => 4.0,
        }
    }
}

/// A unit of work for an agent, wrapping one event plus routing metadata.
/// `task_id` is process-unique; `deadline >= creation_time` is enforced by
/// the orchestrator at submission time, not by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub task_id: String,
    pub agent_type: String,
    pub event: ComplianceEvent,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl AgentTask {
    pub fn new(task_id: impl Into<String>, agent_type: impl Into<String>, event: ComplianceEvent, priority: TaskPriority, deadline: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.into(),
            agent_type: agent_type.into(),
            event,
            priority,
            created_at: Utc::now(),
            deadline,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub supported_event_kinds: Vec<EventKind>,
    pub supported_actions: Vec<String>,
    pub knowledge_domains: Vec<String>,
    pub real_time_capable: bool,
    pub batch_capable: bool,
    pub max_concurrent_tasks: usize,
}

impl AgentCapabilities {
    pub fn can_handle(&self, kind: EventKind) -> bool {
        self.supported_event_kinds.contains(&kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_type: String,
    pub display_name: String,
    pub capabilities: AgentCapabilities,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Initializing,
    Ready,
    Active,
    Busy,
    Error,
    Shutdown,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_processed: u64,
    pub tasks_failed: u64,
    pub avg_duration_ms: f64,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self { tasks_processed: 0, tasks_failed: 0, avg_duration_ms: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub health: AgentHealth,
    pub metrics: AgentMetrics,
    pub last_error: Option<String>,
    pub last_health_check_time: Option<DateTime<Utc>>,
    pub enabled: bool,
    /// Consecutive health-check failures. Two fails degrade the agent, five
    /// fail it outright per spec.md §3 "Health transitions are monotone
    /// within a check interval".
    pub consecutive_health_failures: u32,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self {
            state: AgentState::Initializing,
            health: AgentHealth::Healthy,
            metrics: AgentMetrics::default(),
            last_error: None,
            last_health_check_time: None,
            enabled: true,
            consecutive_health_failures: 0,
        }
    }
}

impl AgentStatus {
    /// Record one health-check outcome and update `health` accordingly.
    pub fn record_health_check(&mut self, healthy: bool) {
        self.last_health_check_time = Some(Utc::now());
        if healthy {
            self.consecutive_health_failures = 0;
            self.health = AgentHealth::Healthy;
            return;
        }
        self.consecutive_health_failures += 1;
        self.health = match self.consecutive_health_failures {
            0 | 1 => AgentHealth::Healthy,
            2..=4 => AgentHealth::Degraded,
            _ => AgentHealth::Critical,
        };
    }
}

/// Round-trip summary returned by `get_status()`. Distinct from the ad-hoc
/// per-agent `AgentStatus` map so the orchestrator can version its public
/// snapshot independently of internal bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub healthy: bool,
    pub shutdown_requested: bool,
    pub tasks_submitted: u64,
    pub tasks_processed: u64,
    pub tasks_failed: u64,
    pub tasks_in_progress: u64,
    pub queue_depth: usize,
    pub agents: HashMap<String, AgentStatus>,
}
