//! Heartbeat receiver: tracks per-agent liveness and classifies health
//! (spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::HeartbeatConfig;
use crate::types::AgentId;

/// Health classification derived from the age of the last heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthClassification {
    Healthy,
    Warning,
    Unhealthy,
}

/// Record of the most recent heartbeat received from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub agent_id: AgentId,
    pub received_at: DateTime<Utc>,
}

/// Tracks liveness for every managed agent and classifies health against
/// `HEARTBEAT_INTERVAL`/`HEARTBEAT_TIMEOUT`.
///
/// Grounded on the owned-map pattern used throughout the teacher for
/// shared mutable registries (`Arc<RwLock<HashMap<...>>>`).
pub struct HeartbeatReceiver {
    config: HeartbeatConfig,
    records: Arc<RwLock<HashMap<AgentId, HeartbeatRecord>>>,
    monitor: RwLock<Option<JoinHandle<()>>>,
}

impl HeartbeatReceiver {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            records: Arc::new(RwLock::new(HashMap::new())),
            monitor: RwLock::new(None),
        }
    }

    pub async fn record_heartbeat(&self, agent_id: AgentId) {
        let mut records = self.records.write().await;
        records.insert(
            agent_id,
            HeartbeatRecord {
                agent_id,
                received_at: Utc::now(),
            },
        );
    }

    /// Classify health for a single agent against the configured
    /// interval/timeout. An agent with no recorded heartbeat is `Healthy`
    /// (it may still be booting) until one `HEARTBEAT_INTERVAL` has
    /// elapsed since it started being monitored; callers that need a
    /// stricter initial state should record a heartbeat at boot.
    pub async fn evaluate_health(&self, agent_id: AgentId) -> HealthClassification {
        let records = self.records.read().await;
        let Some(record) = records.get(&agent_id) else {
            return HealthClassification::Healthy;
        };
        let age = (Utc::now() - record.received_at)
            .to_std()
            .unwrap_or_default();
        let interval = std::time::Duration::from_secs(self.config.interval_seconds);
        let timeout = std::time::Duration::from_secs(self.config.timeout_seconds);
        if age >= timeout {
            HealthClassification::Unhealthy
        } else if age >= interval {
            HealthClassification::Warning
        } else {
            HealthClassification::Healthy
        }
    }

    pub async fn all_unhealthy(&self) -> Vec<AgentId> {
        let records = self.records.read().await;
        let timeout = std::time::Duration::from_secs(self.config.timeout_seconds);
        records
            .values()
            .filter(|record| {
                (Utc::now() - record.received_at)
                    .to_std()
                    .map(|age| age >= timeout)
                    .unwrap_or(false)
            })
            .map(|record| record.agent_id)
            .collect()
    }

    pub async fn forget(&self, agent_id: AgentId) {
        self.records.write().await.remove(&agent_id);
    }

    /// Start a background poller invoking `on_unhealthy` for every agent
    /// that crosses the unhealthy threshold. Idempotent: a second call
    /// replaces the previous task.
    pub async fn start_monitoring<F>(self: &Arc<Self>, mut on_unhealthy: F)
    where
        F: FnMut(AgentId) + Send + 'static,
    {
        let receiver = Arc::clone(self);
        let interval = std::time::Duration::from_secs(self.config.interval_seconds);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for agent_id in receiver.all_unhealthy().await {
                    on_unhealthy(agent_id);
                }
            }
        });
        let mut monitor = self.monitor.write().await;
        if let Some(previous) = monitor.replace(handle) {
            previous.abort();
        }
    }

    pub async fn stop_monitoring(&self) {
        if let Some(handle) = self.monitor.write().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unrecorded_agent_is_healthy() {
        let receiver = HeartbeatReceiver::new(HeartbeatConfig::default());
        let status = receiver.evaluate_health(AgentId::new()).await;
        assert_eq!(status, HealthClassification::Healthy);
    }

    #[tokio::test]
    async fn fresh_heartbeat_is_healthy() {
        let receiver = HeartbeatReceiver::new(HeartbeatConfig::default());
        let agent_id = AgentId::new();
        receiver.record_heartbeat(agent_id).await;
        assert_eq!(
            receiver.evaluate_health(agent_id).await,
            HealthClassification::Healthy
        );
    }

    #[tokio::test]
    async fn stale_heartbeat_past_timeout_is_unhealthy() {
        let config = HeartbeatConfig {
            interval_seconds: 0,
            timeout_seconds: 0,
        };
        let receiver = HeartbeatReceiver::new(config);
        let agent_id = AgentId::new();
        receiver.record_heartbeat(agent_id).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(
            receiver.evaluate_health(agent_id).await,
            HealthClassification::Unhealthy
        );
        assert!(receiver.all_unhealthy().await.contains(&agent_id));
    }

    #[tokio::test]
    async fn forgetting_an_agent_resets_it_to_healthy() {
        let config = HeartbeatConfig {
            interval_seconds: 0,
            timeout_seconds: 0,
        };
        let receiver = HeartbeatReceiver::new(config);
        let agent_id = AgentId::new();
        receiver.record_heartbeat(agent_id).await;
        receiver.forget(agent_id).await;
        assert_eq!(
            receiver.evaluate_health(agent_id).await,
            HealthClassification::Healthy
        );
    }
}
