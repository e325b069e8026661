//! Request/response DTOs for the HTTP boundary, plus the RFC 7807
//! `application/problem+json` envelope every error response uses
//! (spec §7).

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, ApprovalRequestId, JobId, RuntimeError};

/// An RFC 7807 problem document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl ProblemDetails {
    /// Map a core [`RuntimeError`] to a problem document. Status code
    /// selection lives entirely here — core logic never sees an HTTP
    /// status.
    pub fn from_runtime_error(err: &RuntimeError) -> (u16, Self) {
        use crate::types::{ApprovalError, BackendError, LifecycleError, RoutingError, SseError};

        let (status, problem_type, title) = match err {
            RuntimeError::Lifecycle(LifecycleError::NotManaged { .. })
            | RuntimeError::Lifecycle(LifecycleError::JobNotFound { .. }) => {
                (404, "lifecycle/not-found", "Not Found")
            }
            RuntimeError::Lifecycle(LifecycleError::InvalidTransition { .. })
            | RuntimeError::Lifecycle(LifecycleError::AlreadyManaged { .. })
            | RuntimeError::Lifecycle(LifecycleError::NotManagedOrNotDrainable { .. }) => {
                (409, "lifecycle/conflict", "Conflict")
            }
            RuntimeError::Lifecycle(LifecycleError::CrashCooldown { .. }) => {
                (429, "lifecycle/cooldown", "Too Many Requests")
            }
            RuntimeError::Lifecycle(LifecycleError::HydrationFailed { .. }) => {
                (500, "lifecycle/hydration-failed", "Internal Server Error")
            }
            RuntimeError::Backend(BackendError::ConfigurationInvalid(_)) => {
                (400, "backend/invalid-configuration", "Bad Request")
            }
            RuntimeError::Backend(_) => (502, "backend/failure", "Bad Gateway"),
            RuntimeError::Routing(RoutingError::NoBackendAvailable { .. })
            | RuntimeError::Routing(RoutingError::UnknownBackend { .. }) => {
                (404, "routing/no-backend", "Not Found")
            }
            RuntimeError::Routing(RoutingError::BreakerOpen { .. }) => {
                (503, "routing/circuit-open", "Service Unavailable")
            }
            RuntimeError::Approval(ApprovalError::NotFound { .. }) => {
                (404, "approval/not-found", "Not Found")
            }
            RuntimeError::Approval(ApprovalError::AlreadyDecided { .. })
            | RuntimeError::Approval(ApprovalError::Expired { .. }) => {
                (409, "approval/conflict", "Conflict")
            }
            RuntimeError::Approval(ApprovalError::InvalidToken) => {
                (403, "approval/forbidden", "Forbidden")
            }
            RuntimeError::Sse(SseError::UnknownConnection { .. }) => {
                (404, "sse/not-found", "Not Found")
            }
            RuntimeError::Sse(SseError::QueueOverflow { .. }) => {
                (503, "sse/overflow", "Service Unavailable")
            }
            RuntimeError::Configuration(_) => (500, "config/invalid", "Internal Server Error"),
            RuntimeError::Internal(_) => (500, "internal", "Internal Server Error"),
        };

        (
            status,
            ProblemDetails {
                problem_type: format!("https://agentctl.example/problems/{problem_type}"),
                title: title.to_string(),
                status,
                detail: err.to_string(),
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub slug: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub agent_id: AgentId,
    pub payload: serde_json::Value,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecisionRequest {
    pub approve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub id: ApprovalRequestId,
    pub status: String,
    pub decided_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
