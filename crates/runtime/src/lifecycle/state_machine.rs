//! The per-agent lifecycle state machine (spec §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, LifecycleError};

/// Lifecycle states an agent runtime context can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentLifecycleState {
    Booting,
    Hydrating,
    Ready,
    Executing,
    Draining,
    Terminated,
}

impl AgentLifecycleState {
    /// Whether `to` is a legal next state from `self`, per the transition
    /// table in spec §4.1.
    fn can_transition_to(self, to: AgentLifecycleState) -> bool {
        use AgentLifecycleState::*;
        matches!(
            (self, to),
            (Booting, Hydrating)
                | (Hydrating, Ready)
                | (Hydrating, Terminated)
                | (Ready, Executing)
                | (Ready, Draining)
                | (Executing, Draining)
                | (Executing, Terminated)
                | (Draining, Terminated)
        )
    }
}

/// Emitted on every successful transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleTransitionEvent {
    pub agent_id: AgentId,
    pub from: AgentLifecycleState,
    pub to: AgentLifecycleState,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// The state machine owned by a single agent runtime context.
///
/// Not `Sync` on its own; the lifecycle manager is responsible for
/// serializing mutation per agent (spec §5).
#[derive(Debug, Clone)]
pub struct AgentStateMachine {
    agent_id: AgentId,
    state: AgentLifecycleState,
}

impl AgentStateMachine {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            state: AgentLifecycleState::Booting,
        }
    }

    pub fn state(&self) -> AgentLifecycleState {
        self.state
    }

    /// Attempt a transition, returning the emitted event on success.
    pub fn transition(
        &mut self,
        to: AgentLifecycleState,
        reason: Option<String>,
    ) -> Result<LifecycleTransitionEvent, LifecycleError> {
        if !self.state.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", to),
            });
        }
        let event = LifecycleTransitionEvent {
            agent_id: self.agent_id,
            from: self.state,
            to,
            reason,
            at: Utc::now(),
        };
        self.state = to;
        Ok(event)
    }
}
