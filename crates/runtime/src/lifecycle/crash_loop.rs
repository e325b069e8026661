//! Crash-loop detector: tracks crash frequency per agent and derives a
//! cooldown before the agent may be recovered (spec §4.3, invariant I8).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::CrashLoopConfig;
use crate::types::AgentId;

/// Per-agent crash bookkeeping: a running count gated on the gap to the
/// single most recent crash, not a windowed retention count (spec §4.3:
/// "If now - lastCrashAt > window, reset crashCount to 1; else
/// increment").
#[derive(Debug, Default)]
struct AgentCrashes {
    count: u32,
    last_crash_at: Option<DateTime<Utc>>,
}

/// Counts consecutive crashes (gapped by no more than `window_seconds`)
/// and computes the exponential cooldown before an agent may recover.
///
/// `cooldown = min(base * 2^(crash_count - 1), max)`.
pub struct CrashLoopDetector {
    config: CrashLoopConfig,
    crashes: Arc<RwLock<HashMap<AgentId, AgentCrashes>>>,
}

impl CrashLoopDetector {
    pub fn new(config: CrashLoopConfig) -> Self {
        Self {
            config,
            crashes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a crash and return the cooldown duration that now applies.
    pub async fn record_crash(&self, agent_id: AgentId) -> std::time::Duration {
        let mut crashes = self.crashes.write().await;
        let entry = crashes.entry(agent_id).or_default();
        let now = Utc::now();
        entry.count = self.next_count(entry.count, entry.last_crash_at, now);
        entry.last_crash_at = Some(now);
        self.cooldown_for(entry.count)
    }

    /// If `now` is more than `window_seconds` past the last crash, the
    /// streak resets to 1; otherwise it increments (spec §4.3).
    fn next_count(&self, count: u32, last_crash_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
        let window = chrono::Duration::seconds(self.config.window_seconds as i64);
        match last_crash_at {
            Some(last) if now - last <= window => count + 1,
            _ => 1,
        }
    }

    fn cooldown_for(&self, crash_count: u32) -> std::time::Duration {
        if crash_count == 0 {
            return std::time::Duration::ZERO;
        }
        let base_ms = self.config.base_cooldown_seconds * 1000;
        let max_ms = self.config.max_cooldown_seconds * 1000;
        let scaled = base_ms.saturating_mul(1u64 << (crash_count - 1).min(63));
        std::time::Duration::from_millis(scaled.min(max_ms))
    }

    /// Whether the agent is still within its cooldown window.
    pub async fn is_in_cooldown(&self, agent_id: AgentId) -> bool {
        let crashes = self.crashes.read().await;
        let Some(entry) = crashes.get(&agent_id) else {
            return false;
        };
        let Some(last) = entry.last_crash_at else {
            return false;
        };
        let cooldown = self.cooldown_for(entry.count);
        (Utc::now() - last)
            .to_std()
            .map(|elapsed| elapsed < cooldown)
            .unwrap_or(false)
    }

    pub async fn crash_count(&self, agent_id: AgentId) -> u32 {
        self.crashes
            .read()
            .await
            .get(&agent_id)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    pub async fn reset(&self, agent_id: AgentId) {
        self.crashes.write().await.remove(&agent_id);
    }
}
