//! Store Gateway: uniform transactional persistence for rules, changes,
//! rollbacks, audit, and translation rules (spec.md §2). Out of scope per
//! spec.md §1: this crate treats the persistent store as an external
//! collaborator, exposing only the narrow transactional key/query interface
//! every other pillar needs.

mod gateway;
mod memory;
#[cfg(feature = "sql")]
mod sql;

pub use gateway::StoreGateway;
pub use memory::InMemoryStore;
#[cfg(feature = "sql")]
pub use sql::SqlStore;
