//! Common imports for callers wiring up the runtime.

pub use crate::approval::{ApprovalService, ApprovalToken};
pub use crate::config::Config;
pub use crate::execution::{AgenticLoop, BackendRegistry, CircuitBreaker, ExecutionBackend};
pub use crate::lifecycle::{CrashLoopDetector, HeartbeatReceiver, LifecycleManager};
pub use crate::sse::SseConnectionManager;
pub use crate::types::{
    Agent, AgentId, ApprovalRequestId, Job, JobId, Principal, Role, RuntimeError, RuntimeResult,
};
