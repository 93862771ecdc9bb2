use std::collections::HashMap;
use std::sync::Arc;

use compliance_errors::{ComplianceError, ErrorKind};

use crate::agent::Agent;

/// Constructs one agent instance for its `agent_type`. Kept separate from
/// `Agent` itself so registration can happen before construction succeeds or
/// fails (spec.md §4.1 "on init failure, the registration is not kept").
pub trait AgentFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn Agent>, ComplianceError>;
}

impl<F> AgentFactory for F
where
    F: Fn() -> Result<Arc<dyn Agent>, ComplianceError> + Send + Sync,
{
    fn create(&self) -> Result<Arc<dyn Agent>, ComplianceError> {
        self()
    }
}

#[derive(Default)]
pub struct AgentRegistry {
    factories: HashMap<String, Arc<dyn AgentFactory>>,
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, agent_type: impl Into<String>, factory: Arc<dyn AgentFactory>) {
        let agent_type = agent_type.into();
        if !self.factories.contains_key(&agent_type) {
            self.order.push(agent_type.clone());
        }
        tracing::info!(agent_type = %agent_type, "registered agent factory");
        self.factories.insert(agent_type, factory);
    }

    pub fn create_agent(&self, agent_type: &str) -> Result<Arc<dyn Agent>, ComplianceError> {
        let factory = self.factories.get(agent_type).ok_or_else(|| {
            ComplianceError::new(ErrorKind::NotFound, "compliance-registry", "create_agent", format!("no factory for agent_type {agent_type}"))
        })?;
        factory.create()
    }

    pub fn registration_order(&self) -> &[String] {
        &self.order
    }
}
