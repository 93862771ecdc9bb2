//! Golden test for the Agent Orchestrator's bounded task queue, mirroring
//! the teacher's `tests/golden_policy_eval.rs` characterization-test
//! placement.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use compliance_audit::AuditEngine;
use compliance_errors::{ComplianceError, ErrorKind};
use compliance_metrics::MetricsSource;
use compliance_orchestrator::{Orchestrator, OrchestratorConfig};
use compliance_registry::{Agent, AgentFactory};
use compliance_store::InMemoryStore;
use compliance_types::{AgentCapabilities, AgentRegistration, AgentTask, ComplianceEvent, EventKind, Severity, TaskPriority};
use serde_json::Value;

struct SlowAgent(AgentCapabilities);

#[async_trait]
impl Agent for SlowAgent {
    fn capabilities(&self) -> &AgentCapabilities {
        &self.0
    }

    async fn process_event(&self, event: &ComplianceEvent) -> Result<Value, ComplianceError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(event.data.clone())
    }
}

fn caps(kind: EventKind) -> AgentCapabilities {
    AgentCapabilities { supported_event_kinds: vec![kind], supported_actions: vec![], knowledge_domains: vec![], real_time_capable: true, batch_capable: false, max_concurrent_tasks: 4 }
}

/// Scenario 6: queue overflow surfaces to the submitter instead of being
/// dropped silently, and `tasks_submitted` reflects only accepted work.
#[tokio::test]
async fn golden_queue_overflow_surfaces_to_submitter() {
    let store = Arc::new(InMemoryStore::new());
    let audit = Arc::new(AuditEngine::new(store.clone()));
    let metrics = Arc::new(MetricsSource::new());
    let orchestrator = Orchestrator::new(store, audit, metrics, OrchestratorConfig { worker_count: 1, queue_capacity: 2, drain_deadline: Duration::from_secs(5), health_check_interval: Duration::from_secs(300) });
    orchestrator.initialize().unwrap();
    orchestrator
        .register_agent(
            AgentRegistration { agent_type: "kyc".into(), display_name: "kyc".into(), capabilities: caps(EventKind::Transaction), enabled: true },
            &(|| Ok(Arc::new(SlowAgent(caps(EventKind::Transaction))) as Arc<dyn Agent>)) as &dyn AgentFactory,
        )
        .unwrap();

    let submit = |orchestrator: &Arc<Orchestrator>| {
        let event = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "core");
        let task = AgentTask::new(orchestrator.next_task_id(), "kyc", event, TaskPriority::Normal, Utc::now());
        orchestrator.submit_task(task, None)
    };

    // First task is dequeued by the lone worker immediately, leaving the
    // queue itself empty; the next two fill its capacity of 2.
    assert!(submit(&orchestrator).unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(submit(&orchestrator).unwrap());
    assert!(submit(&orchestrator).unwrap());

    let overflowed = submit(&orchestrator).unwrap_err();
    assert_eq!(overflowed.kind, ErrorKind::Resource);

    let status = orchestrator.get_status();
    assert_eq!(status.tasks_submitted, 3);
    orchestrator.shutdown().await;
}
