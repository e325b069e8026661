//! Per-agent SSE fan-out (spec §4.11, invariants I6/I7).
//!
//! Grounded on the teacher's `channel-adapter/src/manager.rs`
//! `ChannelAdapterManager`: a keyed map of subscriber endpoints behind
//! one manager, with connect/broadcast/shutdown as the public surface.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::config::SseConfig;
use crate::sse::connection::Connection;
use crate::sse::event::SseFrame;
use crate::types::{AgentId, ConnectionId};

struct AgentChannel {
    connections: HashMap<ConnectionId, Connection>,
    ring: VecDeque<SseFrame>,
    next_seq: u64,
}

impl AgentChannel {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            ring: VecDeque::new(),
            next_seq: 0,
        }
    }
}

/// Owns every agent's subscriber set and the ring buffer backing
/// reconnect replay.
pub struct SseConnectionManager {
    config: SseConfig,
    channels: Arc<RwLock<HashMap<AgentId, AgentChannel>>>,
    heartbeat_task: RwLock<Option<JoinHandle<()>>>,
}

impl SseConnectionManager {
    pub fn new(config: SseConfig) -> Self {
        Self {
            config,
            channels: Arc::new(RwLock::new(HashMap::new())),
            heartbeat_task: RwLock::new(None),
        }
    }

    /// Subscribe to an agent's event stream, returning the connection id,
    /// a receiver the HTTP layer drains into the response body, and any
    /// buffered frames newer than `last_event_id` to replay before live
    /// events (spec §4.11: "if lastEventId is supplied, replays buffered
    /// events"). Frame ids are the decimal per-agent sequence number
    /// `broadcast` assigns, so resumption is a plain numeric comparison.
    pub async fn connect(
        &self,
        agent_id: AgentId,
        last_event_id: Option<u64>,
    ) -> (ConnectionId, mpsc::Receiver<SseFrame>, Vec<SseFrame>) {
        let (tx, rx) = mpsc::channel(self.config.queue_high_water_mark);
        let connection_id = ConnectionId::new();
        let connection = Connection::new(connection_id, tx);

        {
            let mut channels = self.channels.write().await;
            let channel = channels.entry(agent_id).or_insert_with(AgentChannel::new);
            channel.connections.insert(connection_id, connection);
        }

        let replay = match last_event_id {
            Some(last_id) => self
                .replay_buffer(agent_id)
                .await
                .into_iter()
                .filter(|frame| {
                    frame
                        .id
                        .as_deref()
                        .and_then(|id| id.parse::<u64>().ok())
                        .is_some_and(|id| id > last_id)
                })
                .collect(),
            None => Vec::new(),
        };

        (connection_id, rx, replay)
    }

    pub async fn disconnect(&self, agent_id: AgentId, connection_id: ConnectionId) {
        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.get_mut(&agent_id) {
            channel.connections.remove(&connection_id);
        }
    }

    /// Broadcast one event to every connection subscribed to `agent_id`.
    ///
    /// Ordering is guaranteed per agent: the whole fan-out happens while
    /// holding that agent's slot in the map, so a second `broadcast` call
    /// for the same agent cannot interleave with this one (I6). A
    /// subscriber whose queue overflows or whose receiver has been
    /// dropped is pruned rather than allowed to stall the broadcast.
    pub async fn broadcast(&self, agent_id: AgentId, event: impl Into<String>, data: serde_json::Value) {
        let mut channels = self.channels.write().await;
        let channel = channels.entry(agent_id).or_insert_with(AgentChannel::new);

        let seq = channel.next_seq;
        channel.next_seq += 1;
        let frame = SseFrame::new(event, data).with_id(seq.to_string());

        channel.ring.push_back(frame.clone());
        if channel.ring.len() > self.config.ring_buffer_size {
            channel.ring.pop_front();
        }

        let mut stale = Vec::new();
        for (connection_id, connection) in channel.connections.iter() {
            if connection.try_send(frame.clone()).is_err() {
                stale.push(*connection_id);
            }
        }
        for connection_id in stale {
            channel.connections.remove(&connection_id);
        }
    }

    /// Frames buffered for `agent_id`, oldest first, for replay to a
    /// reconnecting client.
    pub async fn replay_buffer(&self, agent_id: AgentId) -> Vec<SseFrame> {
        let channels = self.channels.read().await;
        channels
            .get(&agent_id)
            .map(|channel| channel.ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn connection_count(&self, agent_id: AgentId) -> usize {
        self.channels
            .read()
            .await
            .get(&agent_id)
            .map(|channel| channel.connections.len())
            .unwrap_or(0)
    }

    /// Start the background heartbeat ticker that keeps idle connections
    /// alive. Idempotent: a second call replaces the previous ticker.
    pub async fn start_heartbeat(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let interval = std::time::Duration::from_secs(self.config.heartbeat_interval_seconds);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let agent_ids: Vec<AgentId> = manager.channels.read().await.keys().copied().collect();
                for agent_id in agent_ids {
                    manager
                        .broadcast(agent_id, "heartbeat", serde_json::json!({}))
                        .await;
                }
            }
        });
        let mut task = self.heartbeat_task.write().await;
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Tear down every connection and stop the heartbeat ticker.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.heartbeat_task.write().await.take() {
            handle.abort();
        }
        self.channels.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SseConfig {
        SseConfig {
            ring_buffer_size: 3,
            heartbeat_interval_seconds: 60,
            queue_high_water_mark: 8,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connected_subscriber() {
        let manager = SseConnectionManager::new(config());
        let agent_id = AgentId::new();
        let (_id_a, mut rx_a, _replay_a) = manager.connect(agent_id, None).await;
        let (_id_b, mut rx_b, _replay_b) = manager.connect(agent_id, None).await;

        manager
            .broadcast(agent_id, "output", serde_json::json!({"token": "hi"}))
            .await;

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn ring_buffer_caps_at_configured_size() {
        let manager = SseConnectionManager::new(config());
        let agent_id = AgentId::new();
        for i in 0..5 {
            manager
                .broadcast(agent_id, "output", serde_json::json!({"i": i}))
                .await;
        }
        let buffer = manager.replay_buffer(agent_id).await;
        assert_eq!(buffer.len(), 3);
    }

    #[tokio::test]
    async fn disconnecting_removes_the_connection() {
        let manager = SseConnectionManager::new(config());
        let agent_id = AgentId::new();
        let (connection_id, _rx, _replay) = manager.connect(agent_id, None).await;
        assert_eq!(manager.connection_count(agent_id).await, 1);
        manager.disconnect(agent_id, connection_id).await;
        assert_eq!(manager.connection_count(agent_id).await, 0);
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_broadcast() {
        let manager = SseConnectionManager::new(config());
        let agent_id = AgentId::new();
        let (_connection_id, rx, _replay) = manager.connect(agent_id, None).await;
        drop(rx);
        manager
            .broadcast(agent_id, "output", serde_json::json!({}))
            .await;
        assert_eq!(manager.connection_count(agent_id).await, 0);
    }

    #[tokio::test]
    async fn connect_with_last_event_id_replays_only_newer_frames() {
        let manager = SseConnectionManager::new(config());
        let agent_id = AgentId::new();
        for i in 0..3 {
            manager
                .broadcast(agent_id, "output", serde_json::json!({"i": i}))
                .await;
        }
        // ids assigned so far are "0", "1", "2"; resuming from "0" should
        // only replay "1" and "2".
        let (_connection_id, _rx, replay) = manager.connect(agent_id, Some(0)).await;
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0].id.as_deref(), Some("1"));
        assert_eq!(replay[1].id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn connect_without_last_event_id_replays_nothing() {
        let manager = SseConnectionManager::new(config());
        let agent_id = AgentId::new();
        manager
            .broadcast(agent_id, "output", serde_json::json!({}))
            .await;
        let (_connection_id, _rx, replay) = manager.connect(agent_id, None).await;
        assert!(replay.is_empty());
    }

    #[tokio::test]
    async fn shutdown_clears_all_connections() {
        let manager = SseConnectionManager::new(config());
        let agent_id = AgentId::new();
        manager.connect(agent_id, None).await;
        manager.shutdown().await;
        assert_eq!(manager.connection_count(agent_id).await, 0);
    }
}
