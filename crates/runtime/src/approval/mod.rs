//! Approval service: human-in-the-loop gate for jobs that require
//! explicit sign-off before proceeding (spec §4.10).

pub mod service;
pub mod token;
pub mod types;

pub use service::ApprovalService;
pub use token::{ApprovalToken, TokenHash};
pub use types::{ApprovalAuditEntry, ApprovalRequest, ApprovalStatus, AuditEventType};
