//! Protocol-neutral message envelopes and translation rules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Protocol {
    JsonRpc,
    RestHttp,
    Grpc,
    Soap,
    WebSocket,
    GraphQl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Request,
    Response,
    Notification,
    Error,
    Heartbeat,
    Ack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub message_kind: MessageKind,
    pub source_protocol: Protocol,
    pub target_protocol: Protocol,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    pub recipient_id: Option<String>,
    /// 1..5, validated by callers; not re-validated here.
    pub priority: u8,
    pub custom_headers: HashMap<String, String>,
}

impl MessageHeader {
    pub fn new(message_id: impl Into<String>, sender_id: impl Into<String>, source_protocol: Protocol, target_protocol: Protocol) -> Self {
        Self {
            message_id: message_id.into(),
            correlation_id: None,
            message_kind: MessageKind::Request,
            source_protocol,
            target_protocol,
            timestamp: Utc::now(),
            sender_id: sender_id.into(),
            recipient_id: None,
            priority: 3,
            custom_headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub from_field: String,
    pub to_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTransform {
    Uppercase,
    Lowercase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueTransformation {
    pub field: String,
    pub transform: ValueTransform,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformationSpec {
    pub field_mappings: Vec<FieldMapping>,
    pub value_transformations: Vec<ValueTransformation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRule {
    pub rule_id: String,
    pub name: String,
    pub from_protocol: Protocol,
    pub to_protocol: Protocol,
    pub transformation_spec: TransformationSpec,
    pub bidirectional: bool,
    pub priority: u32,
    pub active: bool,
}

impl TranslationRule {
    /// Bidirectional rules match either direction.
    pub fn matches(&self, from: Protocol, to: Protocol) -> bool {
        if !self.active {
            return false;
        }
        (self.from_protocol == from && self.to_protocol == to)
            || (self.bidirectional && self.from_protocol == to && self.to_protocol == from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranslationOutcome {
    Success,
    PartialSuccess,
    AdaptationNeeded,
    Failure,
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub result: TranslationOutcome,
    pub translated_payload: serde_json::Value,
    pub translated_header: MessageHeader,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub processing_time_ms: u64,
}
