//! The transport is out of scope (spec.md §1): the fabric delivers framed
//! messages to whatever sink the host process wires up (a real WebSocket
//! write half in production, an in-memory recorder in tests).

use async_trait::async_trait;
use compliance_errors::ComplianceError;
use compliance_types::WsFrame;

#[async_trait]
pub trait TransportSink: Send + Sync {
    async fn send(&self, frame: WsFrame) -> Result<(), ComplianceError>;
}
