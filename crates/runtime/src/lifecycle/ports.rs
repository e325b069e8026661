//! Narrow capability ports the lifecycle manager depends on, kept small
//! and `async_trait`-based so test doubles stay cheap (Design Notes §9:
//! prefer narrow ports over one large `Platform` trait).

use async_trait::async_trait;

use crate::types::{Agent, AgentId, IdentitySnapshot, RuntimeResult};

/// Persistence boundary the lifecycle manager reads/writes through.
/// Storage technology is out of scope; this trait is the seam.
#[async_trait]
pub trait DatabasePort: Send + Sync {
    async fn load_identity(&self, agent_id: AgentId) -> RuntimeResult<IdentitySnapshot>;
    async fn load_agent(&self, agent_id: AgentId) -> RuntimeResult<Agent>;
    async fn save_agent(&self, agent: &Agent) -> RuntimeResult<()>;
}

/// External process/container control for an agent runtime, invoked on
/// `boot`/`terminate`/`scaleToZero` (Design Notes §9: DeployerCapability).
#[async_trait]
pub trait DeployerPort: Send + Sync {
    async fn start(&self, agent_id: AgentId) -> RuntimeResult<()>;
    async fn stop(&self, agent_id: AgentId) -> RuntimeResult<()>;
}
