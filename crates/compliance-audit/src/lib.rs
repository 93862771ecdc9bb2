//! Audit & Rollback Engine: change journaling, entity versioning, and
//! dependency-aware rollback. Grounded on the foundation's audit role in the
//! teacher workspace (a single owner of the change journal every mutating
//! pillar routes through) generalized to this fleet's entity kinds.

mod engine;
mod impact;
mod reports;

pub use engine::{
    AuditEngine, ChangeInput, RollbackOutcome, SnapshotInput,
};
pub use impact::infer_impact;
