//! HTTP route handlers: thin wrappers translating between axum
//! extractors and [`RuntimeApiProvider`] calls, mapping every error
//! through [`ProblemDetails`] (spec §6.1, §7).

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::Json;

use crate::api::traits::RuntimeApiProvider;
use crate::api::types::{
    AgentSummary, ApprovalDecisionRequest, ApprovalSummary, CreateAgentRequest, JobSummary,
    ProblemDetails, SubmitJobRequest,
};
use crate::types::{AgentId, ApprovalRequestId, JobId, Principal, RuntimeError};

type ApiError = (StatusCode, Json<ProblemDetails>);

fn to_api_error(err: RuntimeError) -> ApiError {
    let (status, problem) = ProblemDetails::from_runtime_error(&err);
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(problem),
    )
}

pub async fn create_agent(
    State(provider): State<Arc<dyn RuntimeApiProvider>>,
    Json(request): Json<CreateAgentRequest>,
) -> Result<Json<AgentSummary>, ApiError> {
    provider
        .create_agent(request)
        .await
        .map(Json)
        .map_err(to_api_error)
}

pub async fn get_agent(
    State(provider): State<Arc<dyn RuntimeApiProvider>>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<AgentSummary>, ApiError> {
    provider
        .get_agent(agent_id)
        .await
        .map(Json)
        .map_err(to_api_error)
}

pub async fn delete_agent(
    State(provider): State<Arc<dyn RuntimeApiProvider>>,
    Path(agent_id): Path<AgentId>,
) -> Result<StatusCode, ApiError> {
    provider
        .delete_agent(agent_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_api_error)
}

pub async fn submit_job(
    State(provider): State<Arc<dyn RuntimeApiProvider>>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<Json<JobSummary>, ApiError> {
    provider
        .submit_job(request)
        .await
        .map(Json)
        .map_err(to_api_error)
}

pub async fn get_job(
    State(provider): State<Arc<dyn RuntimeApiProvider>>,
    Path(job_id): Path<JobId>,
) -> Result<Json<JobSummary>, ApiError> {
    provider.get_job(job_id).await.map(Json).map_err(to_api_error)
}

/// `decided_by` is never read from the request body — only `approve` is
/// — the identity comes from the `Principal` the auth middleware placed
/// in request extensions (spec §4.10 security contract).
pub async fn decide_approval(
    State(provider): State<Arc<dyn RuntimeApiProvider>>,
    Extension(principal): Extension<Principal>,
    Path(request_id): Path<ApprovalRequestId>,
    Json(decision): Json<ApprovalDecisionRequest>,
) -> Result<Json<ApprovalSummary>, ApiError> {
    provider
        .decide_approval(request_id, &principal, decision)
        .await
        .map(Json)
        .map_err(to_api_error)
}

pub async fn health_check() -> Json<crate::api::types::HealthResponse> {
    Json(crate::api::types::HealthResponse {
        status: "ok".to_string(),
    })
}
