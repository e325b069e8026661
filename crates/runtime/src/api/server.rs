//! Router assembly: wires routes, the auth/logging middleware stack, and
//! CORS/tracing layers around a shared [`RuntimeApiProvider`].

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::routes;
use crate::api::traits::RuntimeApiProvider;

/// Build the full axum [`Router`] for the control plane's HTTP surface
/// (spec §6.1).
pub fn build_router(provider: Arc<dyn RuntimeApiProvider>) -> Router {
    Router::new()
        .route("/healthz", get(routes::health_check))
        .route("/agents", post(routes::create_agent))
        .route("/agents/:agent_id", get(routes::get_agent))
        .route("/agents/:agent_id", delete(routes::delete_agent))
        .route("/jobs", post(routes::submit_job))
        .route("/jobs/:job_id", get(routes::get_job))
        .route(
            "/approvals/:request_id/decision",
            post(routes::decide_approval),
        )
        .layer(middleware::from_fn(crate::api::middleware::logging_middleware))
        .layer(middleware::from_fn(crate::api::middleware::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(provider)
}
