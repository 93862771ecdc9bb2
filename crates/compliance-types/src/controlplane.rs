//! Control-plane contract shapes (spec.md §6). The reconciliation logic lives
//! in the external Kubernetes-like controller; this crate only names the
//! event/status shapes that cross the boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceEventType {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    #[serde(rename = "type")]
    pub event_type: ResourceEventType,
    pub name: String,
    pub namespace: String,
    pub resource: serde_json::Value,
    pub old_resource: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneStatus {
    pub phase: String,
    pub replicas: u32,
    pub conditions: Vec<String>,
    pub metrics: HashMap<String, f64>,
}
