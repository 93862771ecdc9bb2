//! Collaboration Streamer: maps session/domain events (consensus progress,
//! votes, alerts) onto WebSocket frames targeted at session subscribers. A
//! thin mapper over `compliance_ws::Fabric`, grounded on original_source's
//! `collaboration_streamer.hpp`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use compliance_ws::Fabric;
use compliance_types::{WsFrame, WsMessageType};
use serde_json::Value;

const SENDER_ID: &str = "collaboration-streamer";

fn session_channel(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// Session/domain-event mapper: every `stream_*` method builds a `WsFrame`
/// and fans it out via the fabric's subscription routing.
pub struct Streamer {
    fabric: Arc<Fabric>,
    message_counter: AtomicU64,
}

impl Streamer {
    pub fn new(fabric: Arc<Fabric>) -> Self {
        Self { fabric, message_counter: AtomicU64::new(0) }
    }

    fn next_message_id(&self) -> String {
        format!("strm_{}", self.message_counter.fetch_add(1, Ordering::Relaxed))
    }

    fn emit(&self, session_id: &str, frame_type: WsMessageType, payload: Value) -> usize {
        let frame = WsFrame::new(self.next_message_id(), frame_type, SENDER_ID, payload);
        self.fabric.send_to_subscriptions(&[session_channel(session_id)], &frame)
    }

    pub fn stream_session_state(&self, session_id: &str, session_data: Value) -> usize {
        self.emit(session_id, WsMessageType::SessionUpdate, session_data)
    }

    pub fn stream_participant_joined(&self, session_id: &str, participant: Value) -> usize {
        self.emit(session_id, WsMessageType::SessionUpdate, serde_json::json!({"event": "participant_joined", "participant": participant}))
    }

    pub fn stream_participant_left(&self, session_id: &str, participant_id: &str) -> usize {
        self.emit(session_id, WsMessageType::SessionUpdate, serde_json::json!({"event": "participant_left", "participant_id": participant_id}))
    }

    pub fn stream_participant_status(&self, session_id: &str, status_update: Value) -> usize {
        self.emit(session_id, WsMessageType::SessionUpdate, serde_json::json!({"event": "participant_status", "status": status_update}))
    }

    pub fn stream_activity_message(&self, session_id: &str, message: Value) -> usize {
        self.emit(session_id, WsMessageType::Broadcast, message)
    }

    pub fn stream_decision_update(&self, session_id: &str, decision_data: Value) -> usize {
        self.emit(session_id, WsMessageType::DecisionAnalysisResult, decision_data)
    }

    pub fn stream_rule_evaluation(&self, session_id: &str, eval_data: Value) -> usize {
        self.emit(session_id, WsMessageType::RuleEvaluationResult, eval_data)
    }

    pub fn stream_consensus_initiated(&self, session_id: &str, consensus_data: Value) -> usize {
        self.emit(session_id, WsMessageType::ConsensusUpdate, serde_json::json!({"event": "consensus_initiated", "consensus": consensus_data}))
    }

    pub fn stream_vote_cast(&self, session_id: &str, voter_id: &str, vote: Value) -> usize {
        self.emit(session_id, WsMessageType::ConsensusUpdate, serde_json::json!({"event": "vote_cast", "voter_id": voter_id, "vote": vote}))
    }

    pub fn stream_consensus_update(&self, session_id: &str, consensus_state: Value) -> usize {
        self.emit(session_id, WsMessageType::ConsensusUpdate, consensus_state)
    }

    pub fn stream_consensus_result(&self, session_id: &str, result: Value) -> usize {
        self.emit(session_id, WsMessageType::ConsensusUpdate, serde_json::json!({"event": "consensus_result", "result": result}))
    }

    pub fn stream_learning_feedback(&self, session_id: &str, feedback: Value) -> usize {
        self.emit(session_id, WsMessageType::LearningFeedback, serde_json::json!({"event": "feedback", "feedback": feedback}))
    }

    pub fn stream_learning_update(&self, session_id: &str, update: Value) -> usize {
        self.emit(session_id, WsMessageType::LearningFeedback, serde_json::json!({"event": "update", "update": update}))
    }

    pub fn stream_alert(&self, session_id: &str, alert_data: Value) -> usize {
        self.emit(session_id, WsMessageType::Alert, alert_data)
    }

    /// Alerts and notifications targeted at a single user rather than a
    /// session's subscribers.
    pub fn stream_notification(&self, user_id: &str, notification: Value) -> usize {
        let frame = WsFrame::new(self.next_message_id(), WsMessageType::DirectMessage, SENDER_ID, notification);
        self.fabric.send_to_user(user_id, &frame)
    }

    pub fn broadcast_to_session(&self, session_id: &str, frame: WsFrame) -> usize {
        self.fabric.send_to_subscriptions(&[session_channel(session_id)], &frame)
    }

    pub fn send_to_participant(&self, participant_id: &str, frame: WsFrame) -> usize {
        self.fabric.send_to_user(participant_id, &frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use compliance_errors::ComplianceError;
    use compliance_ws::{FabricConfig, TransportSink};
    use tokio::sync::mpsc;

    struct RecordingSink(mpsc::UnboundedSender<WsFrame>);

    #[async_trait]
    impl TransportSink for RecordingSink {
        async fn send(&self, frame: WsFrame) -> Result<(), ComplianceError> {
            self.0.send(frame).map_err(|_| ComplianceError::new(compliance_errors::ErrorKind::Network, "test", "send", "closed"))
        }
    }

    async fn subscribed_fabric(session_id: &str) -> (Arc<Fabric>, mpsc::UnboundedReceiver<WsFrame>, String) {
        let fabric = Arc::new(Fabric::new(FabricConfig::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = fabric.create_connection(Some("user-1".to_string()), Some(session_id.to_string()));
        let id = conn.connection_id.clone();
        fabric.add_connection(conn, Arc::new(RecordingSink(tx)));
        fabric.authenticate_connection(&id, "user-1");
        fabric.subscribe(&id, &session_channel(session_id));
        (fabric, rx, id)
    }

    #[tokio::test]
    async fn stream_consensus_update_reaches_session_subscriber() {
        let (fabric, mut rx, _id) = subscribed_fabric("sess-1").await;
        let streamer = Streamer::new(fabric);
        let sent = streamer.stream_consensus_update("sess-1", serde_json::json!({"votes": 3}));
        assert_eq!(sent, 1);
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.frame_type, WsMessageType::ConsensusUpdate);
        assert_eq!(frame.payload, serde_json::json!({"votes": 3}));
    }

    #[tokio::test]
    async fn stream_alert_does_not_reach_unrelated_session() {
        let (fabric, mut rx, _id) = subscribed_fabric("sess-1").await;
        let streamer = Streamer::new(fabric);
        let sent = streamer.stream_alert("sess-2", serde_json::json!({"level": "high"}));
        assert_eq!(sent, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stream_notification_targets_user_directly() {
        let (fabric, mut rx, _id) = subscribed_fabric("sess-1").await;
        let streamer = Streamer::new(fabric);
        let sent = streamer.stream_notification("user-1", serde_json::json!({"text": "hi"}));
        assert_eq!(sent, 1);
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.frame_type, WsMessageType::DirectMessage);
    }

    #[tokio::test]
    async fn stream_participant_joined_wraps_event_payload() {
        let (fabric, mut rx, _id) = subscribed_fabric("sess-1").await;
        let streamer = Streamer::new(fabric);
        streamer.stream_participant_joined("sess-1", serde_json::json!({"id": "p1"}));
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.payload["event"], "participant_joined");
    }
}
