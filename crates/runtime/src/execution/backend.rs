//! The polymorphic execution backend contract (spec §4.8).
//!
//! Grounded on the teacher's `cli_executor/adapter.rs` `AiCliAdapter`
//! trait: a small async contract (`name`, capability probe, a health
//! check, and one execution entry point) rather than a wide interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::types::RuntimeResult;

/// What a backend is able to run, reported at registration time and
/// consulted by the router (spec §4.6 step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub goal_types: Vec<String>,
    pub max_concurrency: usize,
    pub supports_cancellation: bool,
}

/// A unit of work handed to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTask {
    pub task_id: String,
    pub goal_type: String,
    pub input: serde_json::Value,
    pub max_turns: u32,
}

/// Token accounting for one reasoning step, following the teacher's
/// `reasoning/inference.rs` `Usage` struct.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn accumulate(&mut self, step: TokenUsage) {
        self.prompt_tokens += step.prompt_tokens;
        self.completion_tokens += step.completion_tokens;
        self.total_tokens += step.total_tokens;
    }
}

/// Streamed output produced while a task executes (spec §3). A stream
/// for one task ends with exactly one `Complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        name: String,
        output: serde_json::Value,
        is_error: bool,
    },
    Usage {
        usage: TokenUsage,
    },
    Complete,
}

/// The terminal result of a task, delivered once through `Handle::result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskResult {
    Completed(serde_json::Value),
    Failed(String),
    Cancelled,
}

/// A running task: its event stream, a cancellation switch, and a
/// one-shot terminal result.
pub struct Handle {
    pub task_id: String,
    pub events: mpsc::Receiver<OutputEvent>,
    cancel: Option<oneshot::Sender<()>>,
    result: oneshot::Receiver<TaskResult>,
}

impl Handle {
    pub fn new(
        task_id: String,
        events: mpsc::Receiver<OutputEvent>,
        cancel: oneshot::Sender<()>,
        result: oneshot::Receiver<TaskResult>,
    ) -> Self {
        Self {
            task_id,
            events,
            cancel: Some(cancel),
            result,
        }
    }

    /// Request cancellation. A no-op if already requested or the task
    /// already finished.
    pub fn cancel(&mut self) {
        if let Some(sender) = self.cancel.take() {
            let _ = sender.send(());
        }
    }

    pub async fn result(self) -> TaskResult {
        self.result.await.unwrap_or(TaskResult::Failed(
            "backend dropped result channel".to_string(),
        ))
    }
}

/// A pluggable execution backend (spec §4.8).
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn backend_id(&self) -> &str;

    async fn start(&self) -> RuntimeResult<()>;
    async fn stop(&self) -> RuntimeResult<()>;
    async fn health_check(&self) -> RuntimeResult<()>;

    fn capabilities(&self) -> Capabilities;

    async fn execute_task(&self, task: ExecutionTask) -> RuntimeResult<Handle>;
}
