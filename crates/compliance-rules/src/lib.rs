//! Rule Execution Engine: typed rule evaluation, confidence scoring, risk
//! aggregation, performance telemetry. Grounded on
//! `packages/pillars/gate/src/engine.rs`'s `GateEngine` (policy cache under
//! an async `RwLock`, `Instant`-timed evaluation, closing `tracing::info!`)
//! and `budget.rs`'s per-rule accounting idiom.

mod engine;
mod evaluate;

pub use engine::{ExecutionMode, RuleEngine};
pub use evaluate::confidence_for;
