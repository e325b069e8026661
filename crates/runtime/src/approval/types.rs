//! Data model for the approval service (spec §3, §6.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ApprovalRequestId, JobId};

/// Status of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// A request for a human decision, blocking a job's progress until
/// decided (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub job_id: JobId,
    pub reason: String,
    pub payload: serde_json::Value,
    pub status: ApprovalStatus,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub token_hash: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        job_id: JobId,
        reason: impl Into<String>,
        payload: serde_json::Value,
        ttl: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApprovalRequestId::new(),
            job_id,
            reason: reason.into(),
            payload,
            status: ApprovalStatus::Pending,
            decided_by: None,
            decided_at: None,
            token_hash: None,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && now >= self.expires_at
    }
}

/// The kind of event an audit entry records (spec §3: `eventType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Requested,
    Approved,
    Rejected,
    Expired,
    ContextRequested,
    PolicyUpdate,
}

/// An immutable audit record against an approval request (spec §3, §4.10:
/// `decidedBy`/actor identity always derived from the authenticated
/// principal, never trusted from a request body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalAuditEntry {
    pub request_id: ApprovalRequestId,
    pub event_type: AuditEventType,
    pub actor: String,
    pub channel: String,
    pub details: serde_json::Value,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_pending_and_not_yet_expired() {
        let request = ApprovalRequest::new(
            JobId::new(),
            "needs review",
            serde_json::json!({}),
            chrono::Duration::hours(1),
        );
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert!(!request.is_expired(Utc::now()));
    }

    #[test]
    fn request_is_expired_once_past_expiry() {
        let request = ApprovalRequest::new(
            JobId::new(),
            "needs review",
            serde_json::json!({}),
            chrono::Duration::seconds(-1),
        );
        assert!(request.is_expired(Utc::now()));
    }

    #[test]
    fn decided_requests_are_never_considered_expired() {
        let mut request = ApprovalRequest::new(
            JobId::new(),
            "needs review",
            serde_json::json!({}),
            chrono::Duration::seconds(-1),
        );
        request.status = ApprovalStatus::Approved;
        assert!(!request.is_expired(Utc::now()));
    }
}
