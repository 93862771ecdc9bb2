//! WebSocket connection and frame types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Authenticated,
    Disconnecting,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConnection {
    pub connection_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub state: ConnectionState,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub subscriptions: HashSet<String>,
    pub failed_pings: u32,
    pub messages_sent: u64,
    pub messages_received: u64,
}

impl WebSocketConnection {
    pub fn new(connection_id: impl Into<String>, user_id: Option<String>, session_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            connection_id: connection_id.into(),
            user_id,
            session_id,
            state: ConnectionState::Connecting,
            connected_at: now,
            last_heartbeat_at: now,
            subscriptions: HashSet::new(),
            failed_pings: 0,
            messages_sent: 0,
            messages_received: 0,
        }
    }

    /// `now - last_heartbeat_at <= connection_timeout`.
    pub fn is_alive(&self, now: DateTime<Utc>, connection_timeout: chrono::Duration) -> bool {
        now - self.last_heartbeat_at <= connection_timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WsMessageType {
    ConnectionEstablished,
    Heartbeat,
    Subscribe,
    Unsubscribe,
    Broadcast,
    DirectMessage,
    SessionUpdate,
    RuleEvaluationResult,
    DecisionAnalysisResult,
    ConsensusUpdate,
    LearningFeedback,
    Alert,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsFrame {
    pub message_id: String,
    #[serde(rename = "type")]
    pub frame_type: WsMessageType,
    pub sender_id: String,
    pub recipient_id: String,
    pub payload: serde_json::Value,
    pub requires_acknowledgment: bool,
}

impl WsFrame {
    pub fn new(message_id: impl Into<String>, frame_type: WsMessageType, sender_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message_id: message_id.into(),
            frame_type,
            sender_id: sender_id.into(),
            recipient_id: String::new(),
            payload,
            requires_acknowledgment: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FabricStats {
    pub connections: usize,
    pub authenticated_connections: usize,
    pub total_messages_sent: u64,
    pub total_messages_received: u64,
    pub total_subscriptions: usize,
}
