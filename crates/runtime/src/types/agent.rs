//! The persistent `Agent` entity and its configuration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AgentId;

/// Status of a persistent agent record.
///
/// `DELETE` at the HTTP boundary is a soft transition to `Archived`, never
/// a row deletion — see `types::job::JobStatus` for the analogous pattern
/// on the job side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AgentStatus {
    #[default]
    Active,
    Disabled,
    Archived,
}

/// Per-agent configuration maps, stored as opaque JSON at the storage
/// boundary (Design Notes: "dynamic record shapes... represent as opaque
/// blobs"). Core logic reads named fields off `model`/`resource_limits`
/// but never assumes a fixed shape for `skills`/`channel_permissions`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    pub model: Option<String>,
    pub skills: serde_json::Value,
    pub resource_limits: serde_json::Value,
    pub channel_permissions: serde_json::Value,
}

/// The persistent `Agent` record (database row shape, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub slug: String,
    pub role: String,
    pub status: AgentStatus,
    pub config: AgentConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, role: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            name: name.into(),
            slug: slug.into(),
            role: role.into(),
            status: AgentStatus::Active,
            config: AgentConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Soft-delete: DELETE routes must call this, never remove the row.
    pub fn archive(&mut self) {
        self.status = AgentStatus::Archived;
        self.updated_at = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

/// Arbitrary per-agent metadata snapshot taken at hydration time.
///
/// This is the "identity row" the lifecycle manager loads during `boot`;
/// it is distinct from `Agent` because hydration only needs a read-only
/// projection, not the full mutable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub agent_id: AgentId,
    pub name: String,
    pub role: String,
    pub config: AgentConfig,
}

impl From<&Agent> for IdentitySnapshot {
    fn from(agent: &Agent) -> Self {
        Self {
            agent_id: agent.id,
            name: agent.name.clone(),
            role: agent.role.clone(),
            config: agent.config.clone(),
        }
    }
}

/// Free-form tags an agent carries for capability/routing decisions.
pub type AgentTags = HashMap<String, String>;
