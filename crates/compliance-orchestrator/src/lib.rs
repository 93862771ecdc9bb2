//! Agent Orchestrator: lifecycle, routing, and execution of agent tasks
//! (spec.md §4.1). Generalizes `AntifragileEngine`'s lock-protected registry
//! and counter idioms (`packages/pillars/arbiter/src/antifragile.rs`) from
//! circuit breakers to agents and their task queue.

mod analytics;
mod orchestrator;
mod queue;

pub use analytics::{get_decision_analytics, AgentDecisionAnalytics, HourlyBucket};
pub use orchestrator::{CompletionSink, EventSource, Orchestrator, OrchestratorConfig, TaskOutcome};
