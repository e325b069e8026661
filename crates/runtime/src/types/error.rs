//! Error taxonomy for the control plane, grouped by the designer's
//! categories in spec §7 and composed into a top-level [`RuntimeError`].

use std::time::Duration;

use thiserror::Error;

use super::{AgentId, ApprovalRequestId, JobId};

/// Top-level control-plane error.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),

    #[error("SSE error: {0}")]
    Sse(#[from] SseError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the agent lifecycle state machine and lifecycle manager.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: String, to: String },

    #[error("agent {agent_id} is not managed")]
    NotManaged { agent_id: AgentId },

    #[error("agent {agent_id} already has an active context")]
    AlreadyManaged { agent_id: AgentId },

    #[error("job {job_id} not found")]
    JobNotFound { job_id: JobId },

    #[error("agent {agent_id} is not managed or not drainable from its current state")]
    NotManagedOrNotDrainable { agent_id: AgentId },

    #[error("agent {agent_id} is in crash cooldown")]
    CrashCooldown { agent_id: AgentId },

    #[error("hydration failed for agent {agent_id}: {reason}")]
    HydrationFailed { agent_id: AgentId, reason: String },
}

/// Errors raised by an execution backend (spec §4.8).
///
/// `Transient` counts toward the owning circuit breaker; `Permanent` and
/// `Configuration` never do (spec §4.5 tie-break).
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("backend configuration invalid: {0}")]
    ConfigurationInvalid(String),

    #[error("transient backend failure: {0}")]
    Transient(String),

    #[error("permanent backend failure: {0}")]
    Permanent(String),

    #[error("task cancelled: {reason}")]
    Cancelled { reason: String },
}

/// Classification of a backend failure, used by the circuit breaker's
/// failure classifier (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClassification {
    Transient,
    Permanent,
}

impl BackendError {
    pub fn classification(&self) -> Option<FailureClassification> {
        match self {
            BackendError::Transient(_) => Some(FailureClassification::Transient),
            BackendError::Permanent(_) | BackendError::ConfigurationInvalid(_) => {
                Some(FailureClassification::Permanent)
            }
            BackendError::Cancelled { .. } => None,
        }
    }
}

/// Errors from the provider router / backend registry (spec §4.6-4.7).
#[derive(Error, Debug, Clone)]
pub enum RoutingError {
    #[error("no backend available for goal type {goal_type}")]
    NoBackendAvailable { goal_type: String },

    #[error("circuit open for backend {provider_id}, retry after {recovery_remaining:?}")]
    BreakerOpen {
        provider_id: String,
        recovery_remaining: Duration,
    },

    #[error("unknown backend {provider_id}")]
    UnknownBackend { provider_id: String },
}

/// Errors from the approval service (spec §4.10).
#[derive(Error, Debug, Clone)]
pub enum ApprovalError {
    #[error("approval request {id} already decided")]
    AlreadyDecided { id: ApprovalRequestId },

    #[error("approval request {id} expired")]
    Expired { id: ApprovalRequestId },

    #[error("approval request {id} not found")]
    NotFound { id: ApprovalRequestId },

    #[error("approval token invalid or already used")]
    InvalidToken,
}

/// Errors from the SSE connection manager (spec §4.11).
#[derive(Error, Debug, Clone)]
pub enum SseError {
    #[error("subscriber queue overflow for connection {connection_id}")]
    QueueOverflow { connection_id: String },

    #[error("unknown connection {connection_id}")]
    UnknownConnection { connection_id: String },
}

/// Result type alias used throughout the crate.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
