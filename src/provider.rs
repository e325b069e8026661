//! In-process [`RuntimeApiProvider`] wiring the HTTP boundary to the
//! core managers. Persistence is an in-memory stand-in behind the same
//! `DatabasePort`/`DeployerPort` seams the lifecycle manager depends on
//! — swapping in a real store means implementing those two traits, not
//! touching this file.

use std::collections::HashMap;
use std::sync::Arc;

use agentctl_runtime::api::traits::RuntimeApiProvider;
use agentctl_runtime::api::types::{
    AgentSummary, ApprovalDecisionRequest, ApprovalSummary, CreateAgentRequest, JobSummary,
    SubmitJobRequest,
};
use agentctl_runtime::approval::ApprovalService;
use agentctl_runtime::execution::BackendRegistry;
use agentctl_runtime::lifecycle::ports::{DatabasePort, DeployerPort};
use agentctl_runtime::lifecycle::{HeartbeatReceiver, LifecycleManager};
use agentctl_runtime::sse::SseConnectionManager;
use agentctl_runtime::types::{
    Agent, AgentId, ApprovalRequestId, IdentitySnapshot, Job, JobId, LifecycleError, Principal,
    RuntimeResult,
};
use async_trait::async_trait;
use tokio::sync::RwLock;

struct InMemoryDatabase {
    agents: RwLock<HashMap<AgentId, Agent>>,
}

impl InMemoryDatabase {
    fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DatabasePort for InMemoryDatabase {
    async fn load_identity(&self, agent_id: AgentId) -> RuntimeResult<IdentitySnapshot> {
        let agent = self.load_agent(agent_id).await?;
        Ok(IdentitySnapshot::from(&agent))
    }

    async fn load_agent(&self, agent_id: AgentId) -> RuntimeResult<Agent> {
        self.agents
            .read()
            .await
            .get(&agent_id)
            .cloned()
            .ok_or(LifecycleError::NotManaged { agent_id }.into())
    }

    async fn save_agent(&self, agent: &Agent) -> RuntimeResult<()> {
        self.agents.write().await.insert(agent.id, agent.clone());
        Ok(())
    }
}

struct NoopDeployer;

#[async_trait]
impl DeployerPort for NoopDeployer {
    async fn start(&self, _agent_id: AgentId) -> RuntimeResult<()> {
        Ok(())
    }
    async fn stop(&self, _agent_id: AgentId) -> RuntimeResult<()> {
        Ok(())
    }
}

pub struct DefaultApiProvider {
    database: Arc<InMemoryDatabase>,
    lifecycle: Arc<LifecycleManager>,
    jobs: RwLock<HashMap<JobId, Job>>,
    pub approvals: Arc<ApprovalService>,
    pub backends: Arc<BackendRegistry>,
    pub sse: Arc<SseConnectionManager>,
}

impl DefaultApiProvider {
    /// Construct every core manager and wire them into one provider,
    /// using an in-memory store behind the lifecycle manager's
    /// `DatabasePort`/`DeployerPort` seams.
    pub fn bootstrap(config: &agentctl_runtime::Config) -> Arc<Self> {
        let database = Arc::new(InMemoryDatabase::new());
        let heartbeat = Arc::new(HeartbeatReceiver::new(config.heartbeat));
        let lifecycle = Arc::new(LifecycleManager::new(
            database.clone() as Arc<dyn DatabasePort>,
            Arc::new(NoopDeployer),
            heartbeat,
            config.crash_loop,
        ));
        let approvals = Arc::new(ApprovalService::new(config.approval.default_ttl_seconds));
        let backends = Arc::new(BackendRegistry::new(config.circuit_breaker));
        let sse = Arc::new(SseConnectionManager::new(config.sse.clone()));

        Arc::new(Self {
            database,
            lifecycle,
            jobs: RwLock::new(HashMap::new()),
            approvals,
            backends,
            sse,
        })
    }
}

#[async_trait]
impl RuntimeApiProvider for DefaultApiProvider {
    async fn create_agent(&self, request: CreateAgentRequest) -> RuntimeResult<AgentSummary> {
        let agent = Agent::new(request.name, request.slug, request.role);
        self.database.save_agent(&agent).await?;
        self.lifecycle.boot(agent.id).await?;
        Ok(AgentSummary {
            id: agent.id,
            name: agent.name,
            status: format!("{:?}", self.lifecycle.state_of(agent.id).await?),
        })
    }

    async fn get_agent(&self, agent_id: AgentId) -> RuntimeResult<AgentSummary> {
        let agent = self.database.load_agent(agent_id).await?;
        Ok(AgentSummary {
            id: agent.id,
            name: agent.name,
            status: format!("{:?}", self.lifecycle.state_of(agent_id).await?),
        })
    }

    async fn delete_agent(&self, agent_id: AgentId) -> RuntimeResult<()> {
        self.lifecycle.scale_to_zero(agent_id).await?;
        Ok(())
    }

    async fn submit_job(&self, request: SubmitJobRequest) -> RuntimeResult<JobSummary> {
        let job = Job::new(request.agent_id, request.payload, request.max_attempts);
        let summary = JobSummary {
            id: job.id,
            status: format!("{:?}", job.status),
        };
        self.jobs.write().await.insert(job.id, job);
        Ok(summary)
    }

    async fn get_job(&self, job_id: JobId) -> RuntimeResult<JobSummary> {
        let jobs = self.jobs.read().await;
        let job = jobs
            .get(&job_id)
            .ok_or(LifecycleError::JobNotFound { job_id })?;
        Ok(JobSummary {
            id: job.id,
            status: format!("{:?}", job.status),
        })
    }

    async fn decide_approval(
        &self,
        request_id: ApprovalRequestId,
        principal: &Principal,
        decision: ApprovalDecisionRequest,
    ) -> RuntimeResult<ApprovalSummary> {
        let decided = self
            .approvals
            .decide(request_id, principal, decision.approve)
            .await?;
        Ok(ApprovalSummary {
            id: decided.id,
            status: format!("{:?}", decided.status),
            decided_by: decided.decided_by,
        })
    }
}
