//! Lifecycle manager: owns one state machine per managed agent and
//! serializes mutation per agent (spec §4.4, §5).
//!
//! Grounded on the teacher's `reasoning/agent_registry.rs`
//! `Arc<RwLock<HashMap<String, RegisteredAgent>>>` registry shape; the
//! per-agent `Mutex` nested inside is this crate's addition to satisfy
//! the "per-agent mutations are serialized" ordering requirement that
//! the teacher's registry does not itself need.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::config::CrashLoopConfig;
use crate::lifecycle::crash_loop::CrashLoopDetector;
use crate::lifecycle::heartbeat::HeartbeatReceiver;
use crate::lifecycle::ports::{DatabasePort, DeployerPort};
use crate::lifecycle::state_machine::{
    AgentLifecycleState, AgentStateMachine, LifecycleTransitionEvent,
};
use crate::types::{AgentId, LifecycleError, RuntimeError, RuntimeResult};

struct AgentRuntimeContext {
    machine: AgentStateMachine,
    paused: bool,
}

/// Coordinates the lifecycle of every managed agent.
pub struct LifecycleManager {
    contexts: RwLock<HashMap<AgentId, Arc<Mutex<AgentRuntimeContext>>>>,
    database: Arc<dyn DatabasePort>,
    deployer: Arc<dyn DeployerPort>,
    pub heartbeat: Arc<HeartbeatReceiver>,
    pub crash_loop: Arc<CrashLoopDetector>,
}

impl LifecycleManager {
    pub fn new(
        database: Arc<dyn DatabasePort>,
        deployer: Arc<dyn DeployerPort>,
        heartbeat: Arc<HeartbeatReceiver>,
        crash_loop_config: CrashLoopConfig,
    ) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            database,
            deployer,
            heartbeat,
            crash_loop: Arc::new(CrashLoopDetector::new(crash_loop_config)),
        }
    }

    async fn get(&self, agent_id: AgentId) -> RuntimeResult<Arc<Mutex<AgentRuntimeContext>>> {
        self.contexts
            .read()
            .await
            .get(&agent_id)
            .cloned()
            .ok_or_else(|| RuntimeError::Lifecycle(LifecycleError::NotManaged { agent_id }))
    }

    pub async fn state_of(&self, agent_id: AgentId) -> RuntimeResult<AgentLifecycleState> {
        let context = self.get(agent_id).await?;
        let context = context.lock().await;
        Ok(context.machine.state())
    }

    /// Boot a new agent: `BOOTING -> HYDRATING`, then `HYDRATING -> READY`
    /// on a successful identity load, or `HYDRATING -> TERMINATED` if it
    /// fails.
    pub async fn boot(&self, agent_id: AgentId) -> RuntimeResult<LifecycleTransitionEvent> {
        if self.crash_loop.is_in_cooldown(agent_id).await {
            return Err(LifecycleError::CrashCooldown { agent_id }.into());
        }
        {
            let mut contexts = self.contexts.write().await;
            if contexts.contains_key(&agent_id) {
                return Err(LifecycleError::AlreadyManaged { agent_id }.into());
            }
            contexts.insert(
                agent_id,
                Arc::new(Mutex::new(AgentRuntimeContext {
                    machine: AgentStateMachine::new(agent_id),
                    paused: false,
                })),
            );
        }
        self.deployer.start(agent_id).await?;
        self.hydrate(agent_id).await
    }

    async fn hydrate(&self, agent_id: AgentId) -> RuntimeResult<LifecycleTransitionEvent> {
        let context = self.get(agent_id).await?;
        let mut context = context.lock().await;
        context
            .machine
            .transition(AgentLifecycleState::Hydrating, None)?;

        match self.database.load_identity(agent_id).await {
            Ok(_snapshot) => Ok(context
                .machine
                .transition(AgentLifecycleState::Ready, None)?),
            Err(err) => {
                let reason = err.to_string();
                context.machine.transition(
                    AgentLifecycleState::Terminated,
                    Some(format!("hydration failed: {reason}")),
                )?;
                Err(LifecycleError::HydrationFailed { agent_id, reason }.into())
            }
        }
    }

    /// `READY -> EXECUTING`.
    pub async fn run(&self, agent_id: AgentId) -> RuntimeResult<LifecycleTransitionEvent> {
        let context = self.get(agent_id).await?;
        let mut context = context.lock().await;
        Ok(context
            .machine
            .transition(AgentLifecycleState::Executing, None)?)
    }

    /// Graceful drain: requires `EXECUTING` or `READY`; transitions to
    /// `DRAINING` then `TERMINATED`, invoking the deployer from either
    /// starting state (spec §4.4: "drain from READY still invokes the
    /// deployer"). Draining from a non-drainable state fails with
    /// `NotManagedOrNotDrainable`.
    pub async fn drain(&self, agent_id: AgentId) -> RuntimeResult<LifecycleTransitionEvent> {
        let context = self.get(agent_id).await?;
        let mut context = context.lock().await;
        if !matches!(
            context.machine.state(),
            AgentLifecycleState::Executing | AgentLifecycleState::Ready
        ) {
            return Err(LifecycleError::NotManagedOrNotDrainable { agent_id }.into());
        }
        context
            .machine
            .transition(AgentLifecycleState::Draining, Some("drain invoked".into()))?;
        drop(context);
        self.deployer.stop(agent_id).await?;
        let context = self.get(agent_id).await?;
        let mut context = context.lock().await;
        Ok(context
            .machine
            .transition(AgentLifecycleState::Terminated, Some("drain complete".into()))?)
    }

    /// Drain unconditionally from any non-terminal state (spec §4.4:
    /// "Drain unconditionally from any non-terminal state").
    pub async fn terminate(&self, agent_id: AgentId) -> RuntimeResult<LifecycleTransitionEvent> {
        let state = self.state_of(agent_id).await?;
        if state == AgentLifecycleState::Terminated {
            return Err(LifecycleError::NotManagedOrNotDrainable { agent_id }.into());
        }
        self.drain(agent_id).await
    }

    /// Scale an idle agent down to zero. A no-op if the agent is
    /// currently executing: unlike `terminate`, `scaleToZero` never
    /// interrupts in-flight work (see `DESIGN.md`).
    pub async fn scale_to_zero(
        &self,
        agent_id: AgentId,
    ) -> RuntimeResult<Option<LifecycleTransitionEvent>> {
        let state = self.state_of(agent_id).await?;
        if state == AgentLifecycleState::Executing {
            return Ok(None);
        }
        self.terminate(agent_id).await.map(Some)
    }

    /// Record an unclean exit: `EXECUTING -> TERMINATED`, starting the
    /// crash-loop cooldown clock.
    pub async fn crash(
        &self,
        agent_id: AgentId,
        reason: impl Into<String>,
    ) -> RuntimeResult<LifecycleTransitionEvent> {
        let context = self.get(agent_id).await?;
        let mut context = context.lock().await;
        let event = context
            .machine
            .transition(AgentLifecycleState::Terminated, Some(reason.into()))?;
        drop(context);
        self.crash_loop.record_crash(agent_id).await;
        Ok(event)
    }

    /// Recover a terminated agent by discarding its old context and
    /// booting a fresh one, subject to the crash-loop cooldown.
    pub async fn recover(&self, agent_id: AgentId) -> RuntimeResult<LifecycleTransitionEvent> {
        if self.crash_loop.is_in_cooldown(agent_id).await {
            return Err(LifecycleError::CrashCooldown { agent_id }.into());
        }
        self.contexts.write().await.remove(&agent_id);
        self.boot(agent_id).await
    }

    pub async fn pause(&self, agent_id: AgentId) -> RuntimeResult<()> {
        let context = self.get(agent_id).await?;
        context.lock().await.paused = true;
        Ok(())
    }

    pub async fn resume(&self, agent_id: AgentId) -> RuntimeResult<()> {
        let context = self.get(agent_id).await?;
        context.lock().await.paused = false;
        Ok(())
    }

    pub async fn is_paused(&self, agent_id: AgentId) -> RuntimeResult<bool> {
        let context = self.get(agent_id).await?;
        Ok(context.lock().await.paused)
    }

    pub async fn handle_heartbeat(&self, agent_id: AgentId) -> RuntimeResult<()> {
        self.get(agent_id).await?;
        self.heartbeat.record_heartbeat(agent_id).await;
        Ok(())
    }

    /// Best-effort shutdown of every managed agent, used at process exit.
    pub async fn shutdown(&self) {
        self.heartbeat.stop_monitoring().await;
        let agent_ids: Vec<AgentId> = self.contexts.read().await.keys().copied().collect();
        for agent_id in agent_ids {
            let state = match self.state_of(agent_id).await {
                Ok(state) => state,
                Err(_) => continue,
            };
            let _ = match state {
                AgentLifecycleState::Executing => self.drain(agent_id).await,
                AgentLifecycleState::Ready => self.terminate(agent_id).await,
                _ => continue,
            };
        }
    }
}
