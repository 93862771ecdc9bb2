use async_trait::async_trait;
use compliance_errors::ComplianceError;
use compliance_types::{AgentCapabilities, ComplianceEvent};
use serde_json::Value;

/// The narrow capability every orchestrated agent implements. Per spec.md §9
/// "the agent never holds a reference back to the orchestrator" — an agent
/// only sees the event it's asked to process.
#[async_trait]
pub trait Agent: Send + Sync {
    fn capabilities(&self) -> &AgentCapabilities;

    async fn process_event(&self, event: &ComplianceEvent) -> Result<Value, ComplianceError>;

    /// `perform_health_check() == true` iff the agent is considered healthy
    /// this cycle (spec.md §4.1 "Health checks").
    async fn perform_health_check(&self) -> bool {
        true
    }

    async fn shutdown(&self) {}
}
