//! Approval service operations (spec §4.10).
//!
//! Grounded on the teacher's registry idiom (`Arc<RwLock<HashMap<...>>>`
//! plus an append-only audit `Vec`), same shape as
//! `reasoning/agent_registry.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::approval::token::{ApprovalToken, TokenHash};
use crate::approval::types::{ApprovalAuditEntry, ApprovalRequest, ApprovalStatus, AuditEventType};
use crate::types::{ApprovalError, ApprovalRequestId, JobId, Principal, Role, RuntimeResult};

/// Owns every in-flight and decided approval request plus its audit
/// trail.
pub struct ApprovalService {
    requests: RwLock<HashMap<ApprovalRequestId, ApprovalRequest>>,
    audit: RwLock<Vec<ApprovalAuditEntry>>,
    default_ttl: chrono::Duration,
}

impl ApprovalService {
    pub fn new(default_ttl_seconds: u64) -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            audit: RwLock::new(Vec::new()),
            default_ttl: chrono::Duration::seconds(default_ttl_seconds as i64),
        }
    }

    /// Create a pending approval request. When `issue_token` is set, a
    /// bearer token is generated and its hash stored; the raw token is
    /// returned once and never persisted.
    pub async fn create_request(
        &self,
        job_id: JobId,
        reason: impl Into<String>,
        payload: serde_json::Value,
        issue_token: bool,
    ) -> (ApprovalRequest, Option<ApprovalToken>) {
        let mut request = ApprovalRequest::new(job_id, reason, payload, self.default_ttl);
        let token = if issue_token {
            let token = ApprovalToken::generate();
            request.token_hash = Some(token.hash().0);
            Some(token)
        } else {
            None
        };
        self.requests.write().await.insert(request.id, request.clone());
        self.audit.write().await.push(ApprovalAuditEntry {
            request_id: request.id,
            event_type: AuditEventType::Requested,
            actor: "system".to_string(),
            channel: "system".to_string(),
            details: serde_json::json!({"reason": request.reason}),
            at: request.created_at,
        });
        (request, token)
    }

    /// Decide a request as the given authenticated principal. `decided_by`
    /// is always derived from `principal`, never from caller-supplied data.
    pub async fn decide(
        &self,
        request_id: ApprovalRequestId,
        principal: &Principal,
        approve: bool,
    ) -> RuntimeResult<ApprovalRequest> {
        if !principal.has_role(Role::Approver) {
            return Err(ApprovalError::InvalidToken.into());
        }
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&request_id)
            .ok_or(ApprovalError::NotFound { id: request_id })?;

        self.apply_decision(request, approve, principal.user_id.clone(), "api")
            .await
    }

    /// Decide a request via a bearer token rather than an authenticated
    /// principal (e.g. a one-click email link). `decided_by` is the
    /// identity the token was issued to.
    pub async fn decide_by_token(
        &self,
        token: &ApprovalToken,
        decided_by: impl Into<String>,
        approve: bool,
    ) -> RuntimeResult<ApprovalRequest> {
        let mut requests = self.requests.write().await;
        let matching_id = requests
            .values()
            .find(|request| {
                request
                    .token_hash
                    .as_ref()
                    .map(|hash| token.matches(&TokenHash(hash.clone())))
                    .unwrap_or(false)
            })
            .map(|request| request.id);

        let Some(request_id) = matching_id else {
            return Err(ApprovalError::InvalidToken.into());
        };
        let request = requests.get_mut(&request_id).expect("just found by id");
        self.apply_decision(request, approve, decided_by.into(), "token")
            .await
    }

    async fn apply_decision(
        &self,
        request: &mut ApprovalRequest,
        approve: bool,
        decided_by: String,
        channel: &str,
    ) -> RuntimeResult<ApprovalRequest> {
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalError::AlreadyDecided { id: request.id }.into());
        }
        if request.is_expired(Utc::now()) {
            request.status = ApprovalStatus::Expired;
            return Err(ApprovalError::Expired { id: request.id }.into());
        }

        request.status = if approve {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        let decided_at = Utc::now();
        request.decided_by = Some(decided_by.clone());
        request.decided_at = Some(decided_at);

        let event_type = if approve {
            AuditEventType::Approved
        } else {
            AuditEventType::Rejected
        };
        self.audit.write().await.push(ApprovalAuditEntry {
            request_id: request.id,
            event_type,
            actor: decided_by,
            channel: channel.to_string(),
            details: serde_json::Value::Null,
            at: decided_at,
        });

        Ok(request.clone())
    }

    /// Sweep every still-pending request and mark any that have crossed
    /// their TTL as `Expired`, emitting an audit entry for each and
    /// returning the ids that were swept.
    pub async fn expire_stale_requests(&self) -> Vec<ApprovalRequestId> {
        let now: DateTime<Utc> = Utc::now();
        let mut requests = self.requests.write().await;
        let mut expired = Vec::new();
        for request in requests.values_mut() {
            if request.is_expired(now) {
                request.status = ApprovalStatus::Expired;
                expired.push(request.id);
            }
        }
        drop(requests);

        if !expired.is_empty() {
            let mut audit = self.audit.write().await;
            for request_id in &expired {
                audit.push(ApprovalAuditEntry {
                    request_id: *request_id,
                    event_type: AuditEventType::Expired,
                    actor: "system".to_string(),
                    channel: "system".to_string(),
                    details: serde_json::Value::Null,
                    at: now,
                });
            }
        }

        expired
    }

    pub async fn get(&self, request_id: ApprovalRequestId) -> RuntimeResult<ApprovalRequest> {
        self.requests
            .read()
            .await
            .get(&request_id)
            .cloned()
            .ok_or(ApprovalError::NotFound { id: request_id }.into())
    }

    pub async fn get_audit_trail(&self, request_id: ApprovalRequestId) -> Vec<ApprovalAuditEntry> {
        self.audit
            .read()
            .await
            .iter()
            .filter(|entry| entry.request_id == request_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approver() -> Principal {
        Principal {
            user_id: "alice".to_string(),
            roles: vec![Role::Approver],
        }
    }

    fn viewer() -> Principal {
        Principal {
            user_id: "bob".to_string(),
            roles: vec![Role::Viewer],
        }
    }

    #[tokio::test]
    async fn decide_records_principal_as_decided_by() {
        let service = ApprovalService::new(3600);
        let (request, _token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), false)
            .await;
        let decided = service.decide(request.id, &approver(), true).await.unwrap();
        assert_eq!(decided.decided_by.as_deref(), Some("alice"));
        assert_eq!(decided.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn non_approver_cannot_decide() {
        let service = ApprovalService::new(3600);
        let (request, _token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), false)
            .await;
        let err = service.decide(request.id, &viewer(), true).await.unwrap_err();
        assert!(matches!(
            err,
            crate::types::RuntimeError::Approval(ApprovalError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn cannot_decide_twice() {
        let service = ApprovalService::new(3600);
        let (request, _token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), false)
            .await;
        service.decide(request.id, &approver(), true).await.unwrap();
        let err = service.decide(request.id, &approver(), true).await.unwrap_err();
        assert!(matches!(
            err,
            crate::types::RuntimeError::Approval(ApprovalError::AlreadyDecided { .. })
        ));
    }

    #[tokio::test]
    async fn decide_by_token_identifies_the_right_request() {
        let service = ApprovalService::new(3600);
        let (request, token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), true)
            .await;
        let token = token.unwrap();
        let decided = service
            .decide_by_token(&token, "link-recipient", true)
            .await
            .unwrap();
        assert_eq!(decided.id, request.id);
        assert_eq!(decided.decided_by.as_deref(), Some("link-recipient"));
    }

    #[tokio::test]
    async fn decide_by_wrong_token_fails() {
        let service = ApprovalService::new(3600);
        service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), true)
            .await;
        let forged = ApprovalToken::generate();
        let err = service
            .decide_by_token(&forged, "attacker", true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::types::RuntimeError::Approval(ApprovalError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn expired_request_cannot_be_decided() {
        let service = ApprovalService::new(0);
        let (request, _token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), false)
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let err = service.decide(request.id, &approver(), true).await.unwrap_err();
        assert!(matches!(
            err,
            crate::types::RuntimeError::Approval(ApprovalError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn expire_stale_requests_sweeps_pending_past_ttl() {
        let service = ApprovalService::new(0);
        let (request, _token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), false)
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let expired = service.expire_stale_requests().await;
        assert_eq!(expired, vec![request.id]);
        assert_eq!(service.get(request.id).await.unwrap().status, ApprovalStatus::Expired);
    }

    #[tokio::test]
    async fn audit_trail_accumulates_decisions() {
        let service = ApprovalService::new(3600);
        let (request, _token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), false)
            .await;
        service.decide(request.id, &approver(), true).await.unwrap();
        let trail = service.get_audit_trail(request.id).await;
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].event_type, AuditEventType::Requested);
        assert_eq!(trail[1].event_type, AuditEventType::Approved);
        assert_eq!(trail[1].actor, "alice");
    }

    #[tokio::test]
    async fn create_request_records_a_requested_audit_entry() {
        let service = ApprovalService::new(3600);
        let (request, _token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), false)
            .await;
        let trail = service.get_audit_trail(request.id).await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].event_type, AuditEventType::Requested);
    }

    #[tokio::test]
    async fn expire_stale_requests_records_an_expired_audit_entry() {
        let service = ApprovalService::new(0);
        let (request, _token) = service
            .create_request(JobId::new(), "needs review", serde_json::json!({}), false)
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        service.expire_stale_requests().await;
        let trail = service.get_audit_trail(request.id).await;
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].event_type, AuditEventType::Expired);
    }
}
