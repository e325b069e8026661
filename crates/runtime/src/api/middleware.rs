//! Authentication and request logging middleware for the HTTP boundary.
//!
//! Grounded on the teacher's `api/middleware.rs` bearer-token
//! `auth_middleware` (constant-time comparison via `subtle`) and its
//! `logging_middleware` tracing span, extended to resolve a [`Principal`]
//! instead of a pass/fail flag so downstream handlers can enforce roles
//! (spec §4.10 security contract: `decidedBy` always comes from the
//! authenticated principal, never a request body).

use std::env;
use std::time::Instant;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::types::{Principal, Role};

/// Resolve the caller's [`Principal`] from a bearer token and insert it
/// into request extensions for handlers to read.
///
/// Token-to-role mapping is deliberately simple (one shared token per
/// role, compared in constant time): a real deployment would swap this
/// for a session/identity provider lookup behind the same middleware
/// contract.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_value = request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let principal = resolve_principal(token).ok_or(StatusCode::UNAUTHORIZED)?;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

fn resolve_principal(token: &str) -> Option<Principal> {
    let mut roles = Vec::new();
    if token_matches_env("AGENTCTL_APPROVER_TOKEN", token) {
        roles.push(Role::Approver);
    }
    if token_matches_env("AGENTCTL_OPERATOR_TOKEN", token) {
        roles.push(Role::Operator);
    }
    if token_matches_env("AGENTCTL_VIEWER_TOKEN", token) {
        roles.push(Role::Viewer);
    }
    if roles.is_empty() {
        return None;
    }
    Some(Principal {
        user_id: format!("token:{}", &token[..token.len().min(8)]),
        roles,
    })
}

fn token_matches_env(var: &str, token: &str) -> bool {
    match env::var(var) {
        Ok(expected) => bool::from(expected.as_bytes().ct_eq(token.as_bytes())),
        Err(_) => false,
    }
}

/// Structured per-request logging, matching the teacher's tracing-span
/// shape.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let span = tracing::info_span!("http_request", %method, %uri, status_code = tracing::field::Empty, latency_ms = tracing::field::Empty);
    let _guard = span.enter();

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    span.record("status_code", response.status().as_u16());
    span.record("latency_ms", latency_ms);
    tracing::info!(status_code = response.status().as_u16(), latency_ms, "request completed");

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn token_with_no_matching_env_var_resolves_to_none() {
        env::remove_var("AGENTCTL_VIEWER_TOKEN");
        env::remove_var("AGENTCTL_OPERATOR_TOKEN");
        env::remove_var("AGENTCTL_APPROVER_TOKEN");
        assert!(resolve_principal("anything").is_none());
    }

    #[test]
    #[serial]
    fn matching_viewer_token_grants_viewer_role() {
        env::set_var("AGENTCTL_VIEWER_TOKEN", "secret-view");
        let principal = resolve_principal("secret-view").unwrap();
        assert!(principal.has_role(Role::Viewer));
        env::remove_var("AGENTCTL_VIEWER_TOKEN");
    }
}
