//! The seam between HTTP handlers and the core runtime.
//!
//! Grounded on the teacher's `api/traits.rs` `RuntimeApiProvider`: one
//! narrow trait object stored in axum's `State`, so handlers never touch
//! the concrete lifecycle/approval/sse managers directly.

use async_trait::async_trait;

use crate::api::types::{
    AgentSummary, ApprovalDecisionRequest, ApprovalSummary, CreateAgentRequest, JobSummary,
    SubmitJobRequest,
};
use crate::types::{AgentId, ApprovalRequestId, JobId, Principal, RuntimeResult};

#[async_trait]
pub trait RuntimeApiProvider: Send + Sync {
    async fn create_agent(&self, request: CreateAgentRequest) -> RuntimeResult<AgentSummary>;
    async fn get_agent(&self, agent_id: AgentId) -> RuntimeResult<AgentSummary>;
    async fn delete_agent(&self, agent_id: AgentId) -> RuntimeResult<()>;

    async fn submit_job(&self, request: SubmitJobRequest) -> RuntimeResult<JobSummary>;
    async fn get_job(&self, job_id: JobId) -> RuntimeResult<JobSummary>;

    async fn decide_approval(
        &self,
        request_id: ApprovalRequestId,
        principal: &Principal,
        decision: ApprovalDecisionRequest,
    ) -> RuntimeResult<ApprovalSummary>;
}
