//! The persistent `Job` entity: one unit of work owned by exactly one agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentId, JobId};

/// Job lifecycle status. Transitions follow the lattice documented in
/// spec §3: `Pending -> Scheduled -> Running -> {terminal | WaitingForApproval}`,
/// `WaitingForApproval -> Running` on decision, and
/// `{Failed | TimedOut} -> Retrying` while `attempt < max_attempts`,
/// otherwise `-> DeadLetter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Scheduled,
    Running,
    WaitingForApproval,
    Completed,
    Failed,
    TimedOut,
    Retrying,
    DeadLetter,
}

impl JobStatus {
    /// Whether no further transition is possible without operator
    /// intervention (used by the scheduler to decide whether a job still
    /// needs attention).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::DeadLetter)
    }
}

/// Opaque per-job checkpoint, persisted for crash recovery.
///
/// The payload is intentionally an opaque JSON blob (Design Notes:
/// represent dynamic record shapes as opaque blobs at the storage
/// boundary) — core logic never pattern-matches its internal shape, it
/// only round-trips it and verifies `checkpoint_crc`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Checkpoint {
    pub data: serde_json::Value,
    pub checkpoint_crc: u32,
}

impl Checkpoint {
    pub fn new(data: serde_json::Value) -> Self {
        let crc = crc32(&data);
        Self {
            data,
            checkpoint_crc: crc,
        }
    }

    /// Verify the stored CRC still matches the stored data.
    pub fn is_valid(&self) -> bool {
        crc32(&self.data) == self.checkpoint_crc
    }
}

/// Minimal CRC-32 (IEEE) implementation so checkpoint integrity can be
/// verified without pulling in a dedicated crate for one small checksum —
/// the polynomial table is the standard reflected 0xEDB88320 table.
fn crc32(value: &serde_json::Value) -> u32 {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let mut crc: u32 = 0xFFFF_FFFF;
    for byte in bytes {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// The persistent `Job` record (database row shape, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub agent_id: AgentId,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub checkpoint: Option<Checkpoint>,
    pub error: Option<serde_json::Value>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub timeout_seconds: u64,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub approval_expires_at: Option<DateTime<Utc>>,
    pub paused: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(agent_id: AgentId, payload: serde_json::Value, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            agent_id,
            status: JobStatus::Pending,
            payload,
            result: None,
            checkpoint: None,
            error: None,
            attempt: 0,
            max_attempts,
            timeout_seconds: 300,
            heartbeat_at: None,
            approval_expires_at: None,
            paused: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the outcome of a failed or timed-out attempt, following the
    /// lattice: retry while attempts remain, otherwise dead-letter.
    pub fn apply_failure(&mut self, timed_out: bool) {
        self.status = if self.attempt < self.max_attempts {
            JobStatus::Retrying
        } else {
            JobStatus::DeadLetter
        };
        let reason = if timed_out { "timed_out" } else { "failed" };
        self.error = Some(serde_json::json!({"reason": reason, "attempt": self.attempt}));
        self.updated_at = Utc::now();
    }
}
