//! Compliance Fleet: shared domain and configuration types.
//!
//! This crate is the foundation every pillar depends on, the same role
//! `agentkern-governance` plays for AgentKern: plain, serde-derived types with
//! no behavior beyond small pure helpers (impact inference, risk thresholds).
//! Components own their own state machines; this crate just names the shapes
//! they pass between each other.

pub mod agent;
pub mod audit;
pub mod config;
pub mod controlplane;
pub mod event;
pub mod message;
pub mod rule;
pub mod websocket;

pub use agent::*;
pub use audit::*;
pub use config::*;
pub use controlplane::*;
pub use event::*;
pub use message::*;
pub use rule::*;
pub use websocket::*;
