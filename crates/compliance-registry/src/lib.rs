//! Agent Registry: maps `agent_type` to a factory and constructs agents on
//! demand. Generalizes `AdapterRegistry`'s protocol-keyed trait-object map
//! (`packages/pillars/nexus/src/protocols/adapter.rs`) from protocols to
//! agent types.

mod agent;
mod registry;

pub use agent::Agent;
pub use registry::{AgentFactory, AgentRegistry};
