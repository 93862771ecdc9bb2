use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use compliance_errors::{ComplianceError, ErrorKind};
use compliance_types::{ConnectionState, FabricStats, WebSocketConnection, WsFrame};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::sink::TransportSink;

#[derive(Debug, Clone)]
pub struct FabricConfig {
    pub max_connections: usize,
    pub heartbeat_interval: Duration,
    pub connection_timeout: Duration,
    pub message_queue_size: usize,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self { max_connections: 5000, heartbeat_interval: Duration::from_secs(30), connection_timeout: Duration::from_secs(300), message_queue_size: 1000 }
    }
}

/// Bounded FIFO with drop-oldest-on-overflow semantics (spec.md §4.4
/// "outbound queue overflow drops the oldest unacked message").
struct OutboundQueue {
    frames: Mutex<VecDeque<WsFrame>>,
    notify: Notify,
    capacity: usize,
    overflow_count: AtomicU64,
}

impl OutboundQueue {
    fn new(capacity: usize) -> Self {
        Self { frames: Mutex::new(VecDeque::new()), notify: Notify::new(), capacity, overflow_count: AtomicU64::new(0) }
    }

    fn push(&self, frame: WsFrame) {
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            frames.pop_front();
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        }
        frames.push_back(frame);
        drop(frames);
        self.notify.notify_one();
    }

    async fn pop(&self) -> WsFrame {
        loop {
            if let Some(frame) = self.frames.lock().pop_front() {
                return frame;
            }
            self.notify.notified().await;
        }
    }
}

struct ConnectionEntry {
    connection: Arc<Mutex<WebSocketConnection>>,
    queue: Arc<OutboundQueue>,
}

/// Owns the connection pool, subscription routing, fan-out queues, heartbeat
/// emission, and liveness sweeping.
pub struct Fabric {
    connections: RwLock<HashMap<String, ConnectionEntry>>,
    config: FabricConfig,
    total_messages_sent: Arc<AtomicU64>,
    total_messages_received: AtomicU64,
}

impl Fabric {
    pub fn new(config: FabricConfig) -> Self {
        Self { connections: RwLock::new(HashMap::new()), config, total_messages_sent: Arc::new(AtomicU64::new(0)), total_messages_received: AtomicU64::new(0) }
    }

    /// Returns a new connection in `CONNECTING` state; not yet pooled.
    pub fn create_connection(&self, user_id: Option<String>, session_id: Option<String>) -> WebSocketConnection {
        WebSocketConnection::new(format!("conn_{}", Uuid::new_v4()), user_id, session_id)
    }

    /// Pools `conn` and spawns its dedicated serializer task, if capacity
    /// allows. Returns `false` (without pooling) if `max_connections` is
    /// reached.
    pub fn add_connection(&self, mut conn: WebSocketConnection, sink: Arc<dyn TransportSink>) -> bool {
        let mut connections = self.connections.write();
        if connections.len() >= self.config.max_connections {
            return false;
        }
        conn.state = ConnectionState::Connected;
        let queue = Arc::new(OutboundQueue::new(self.config.message_queue_size));
        let connection_id = conn.connection_id.clone();
        let connection = Arc::new(Mutex::new(conn));
        connections.insert(connection_id.clone(), ConnectionEntry { connection: connection.clone(), queue: queue.clone() });
        drop(connections);

        let total_messages_sent = self.total_messages_sent.clone();
        tokio::spawn(async move {
            loop {
                let frame = queue.pop().await;
                if sink.send(frame).await.is_err() {
                    break;
                }
                connection.lock().messages_sent += 1;
                total_messages_sent.fetch_add(1, Ordering::Relaxed);
            }
        });

        tracing::info!(connection_id = %connection_id, "connection pooled");
        true
    }

    /// Marks `DISCONNECTED` and removes; the serializer task exits on its
    /// next failed `sink.send` once the sink itself is torn down by the
    /// caller.
    pub fn remove_connection(&self, id: &str) -> bool {
        let removed = self.connections.write().remove(id).is_some();
        if removed {
            tracing::info!(connection_id = %id, "connection removed");
        }
        removed
    }

    pub fn authenticate_connection(&self, id: &str, user_id: impl Into<String>) -> bool {
        self.with_connection(id, |conn| {
            conn.user_id = Some(user_id.into());
            conn.state = ConnectionState::Authenticated;
        })
    }

    pub fn subscribe(&self, id: &str, channel: &str) -> bool {
        self.with_connection(id, |conn| {
            conn.subscriptions.insert(channel.to_string());
        })
    }

    pub fn unsubscribe(&self, id: &str, channel: &str) -> bool {
        self.with_connection(id, |conn| {
            conn.subscriptions.remove(channel);
        })
    }

    fn with_connection(&self, id: &str, f: impl FnOnce(&mut WebSocketConnection)) -> bool {
        let connections = self.connections.read();
        match connections.get(id) {
            Some(entry) => {
                f(&mut entry.connection.lock());
                true
            }
            None => false,
        }
    }

    /// Enqueues to every `AUTHENTICATED` connection; returns the count
    /// reached.
    pub fn broadcast_message(&self, msg: &WsFrame) -> usize {
        let connections = self.connections.read();
        let mut sent = 0;
        for entry in connections.values() {
            let is_authenticated = entry.connection.lock().state == ConnectionState::Authenticated;
            if is_authenticated {
                self.enqueue(entry, msg.clone());
                sent += 1;
            }
        }
        sent
    }

    pub fn send_to_connection(&self, id: &str, msg: WsFrame) -> Result<(), ComplianceError> {
        let connections = self.connections.read();
        match connections.get(id) {
            Some(entry) => {
                self.enqueue(entry, msg);
                Ok(())
            }
            None => Err(ComplianceError::new(ErrorKind::NotFound, "compliance-ws", "send_to_connection", format!("no connection {id}"))),
        }
    }

    /// Delivers to every connection whose `user_id` matches.
    pub fn send_to_user(&self, user_id: &str, msg: &WsFrame) -> usize {
        let connections = self.connections.read();
        let mut sent = 0;
        for entry in connections.values() {
            let matches = entry.connection.lock().user_id.as_deref() == Some(user_id);
            if matches {
                self.enqueue(entry, msg.clone());
                sent += 1;
            }
        }
        sent
    }

    /// OR semantics: any channel in `channels` intersecting the connection's
    /// subscriptions is sufficient (resolves spec.md §4.4's open question).
    pub fn send_to_subscriptions(&self, channels: &[String], msg: &WsFrame) -> usize {
        let connections = self.connections.read();
        let mut sent = 0;
        for entry in connections.values() {
            let matches = {
                let conn = entry.connection.lock();
                channels.iter().any(|c| conn.subscriptions.contains(c))
            };
            if matches {
                self.enqueue(entry, msg.clone());
                sent += 1;
            }
        }
        sent
    }

    /// Enqueues only; `messages_sent`/`total_messages_sent` are counted by
    /// the connection's serializer task after a successful transport write,
    /// so a dropped-on-overflow frame is never counted as sent.
    fn enqueue(&self, entry: &ConnectionEntry, msg: WsFrame) {
        entry.queue.push(msg);
    }

    /// Number of frames successfully handed to `id`'s transport, or `None`
    /// if `id` isn't pooled.
    pub fn messages_sent(&self, id: &str) -> Option<u64> {
        self.connections.read().get(id).map(|entry| entry.connection.lock().messages_sent)
    }

    pub fn record_message_received(&self, id: &str) {
        if self.with_connection(id, |conn| conn.messages_received += 1) {
            self.total_messages_received.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> FabricStats {
        let connections = self.connections.read();
        let authenticated = connections.values().filter(|e| e.connection.lock().state == ConnectionState::Authenticated).count();
        let total_subscriptions = connections.values().map(|e| e.connection.lock().subscriptions.len()).sum();
        FabricStats {
            connections: connections.len(),
            authenticated_connections: authenticated,
            total_messages_sent: self.total_messages_sent.load(Ordering::Relaxed),
            total_messages_received: self.total_messages_received.load(Ordering::Relaxed),
            total_subscriptions,
        }
    }

    /// Broadcasts one `HEARTBEAT` frame to every authenticated connection;
    /// called by the heartbeat task at `heartbeat_interval`.
    pub fn tick_heartbeat(&self) -> usize {
        let frame = WsFrame::new(format!("hb_{}", Uuid::new_v4()), compliance_types::WsMessageType::Heartbeat, "fabric", serde_json::Value::Null);
        self.broadcast_message(&frame)
    }

    /// Records a pong for `id`: resets `failed_pings` and refreshes
    /// `last_heartbeat_at`.
    pub fn record_pong(&self, id: &str) -> bool {
        self.with_connection(id, |conn| {
            conn.last_heartbeat_at = Utc::now();
            conn.failed_pings = 0;
        })
    }

    /// Removes connections whose `last_heartbeat_at` exceeds
    /// `connection_timeout`; called by the liveness task every 30s. Returns
    /// the removed connection ids.
    pub fn sweep_liveness(&self) -> Vec<String> {
        let now = Utc::now();
        let timeout = ChronoDuration::from_std(self.config.connection_timeout).unwrap_or(ChronoDuration::seconds(300));
        let dead: Vec<String> = {
            let connections = self.connections.read();
            connections
                .iter()
                .filter(|(_, entry)| !entry.connection.lock().is_alive(now, timeout))
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in &dead {
            self.remove_connection(id);
        }
        dead
    }
}
