//! An [`ExecutionBackend`] driven by the [`AgenticLoop`] (spec §4.8,
//! §4.9).
//!
//! Grounded on the teacher's `cli_executor/executor.rs` spawn-and-bridge
//! shape: the loop runs on its own task, its [`LoopEvent`]s are
//! translated onto the `Handle`'s [`OutputEvent`] channel, and the
//! terminal [`TaskResult`] is delivered once through the result
//! one-shot.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::execution::agentic_loop::{AgenticLoop, LoopEvent, LoopOutcome, Reasoner, ToolRegistry};
use crate::execution::backend::{
    Capabilities, ExecutionBackend, ExecutionTask, Handle, OutputEvent, TaskResult,
};
use crate::types::RuntimeResult;

/// Builds the `Reasoner`/`ToolRegistry` pair a task should run against.
/// A real backend implements this to translate `ExecutionTask::goal_type`
/// and `input` into a model client and tool set; tests use a fixed pair.
#[async_trait]
pub trait AgenticBackendFactory: Send + Sync {
    async fn build(
        &self,
        task: &ExecutionTask,
    ) -> RuntimeResult<(Box<dyn Reasoner>, Box<dyn ToolRegistry>)>;
}

/// An [`ExecutionBackend`] that dispatches every task through the
/// shared [`AgenticLoop`], so any backend wired up this way gets
/// max-turns bounding, tool gating, and usage accounting for free.
pub struct AgenticLoopBackend {
    backend_id: String,
    capabilities: Capabilities,
    factory: Arc<dyn AgenticBackendFactory>,
}

impl AgenticLoopBackend {
    pub fn new(
        backend_id: impl Into<String>,
        capabilities: Capabilities,
        factory: Arc<dyn AgenticBackendFactory>,
    ) -> Self {
        Self {
            backend_id: backend_id.into(),
            capabilities,
            factory,
        }
    }
}

#[async_trait]
impl ExecutionBackend for AgenticLoopBackend {
    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    async fn start(&self) -> RuntimeResult<()> {
        Ok(())
    }

    async fn stop(&self) -> RuntimeResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> RuntimeResult<()> {
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn execute_task(&self, task: ExecutionTask) -> RuntimeResult<Handle> {
        let (reasoner, tools) = self.factory.build(&task).await?;

        let (output_tx, output_rx) = mpsc::channel(64);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (result_tx, result_rx) = oneshot::channel();
        let (loop_tx, loop_rx) = mpsc::channel(64);

        let task_id = task.task_id.clone();
        let max_turns = task.max_turns;
        let initial_input = task.input.clone();

        tokio::spawn(bridge_events(loop_rx, output_tx));

        tokio::spawn(async move {
            let outcome = AgenticLoop::run(
                reasoner.as_ref(),
                tools.as_ref(),
                initial_input,
                max_turns,
                &loop_tx,
                cancel_rx,
            )
            .await;
            drop(loop_tx);
            let _ = result_tx.send(outcome_to_result(outcome));
        });

        Ok(Handle::new(task_id, output_rx, cancel_tx, result_rx))
    }
}

/// Translate the loop's progress events into the backend's output
/// stream, ending with exactly one `Complete` once the loop's event
/// channel closes.
async fn bridge_events(mut loop_rx: mpsc::Receiver<LoopEvent>, output_tx: mpsc::Sender<OutputEvent>) {
    while let Some(event) = loop_rx.recv().await {
        let translated = match event {
            LoopEvent::Started | LoopEvent::Turn { .. } => None,
            LoopEvent::ToolCall { name, arguments } => Some(OutputEvent::ToolUse { name, arguments }),
            LoopEvent::ToolResult { name, output, is_error } => {
                Some(OutputEvent::ToolResult { name, output, is_error })
            }
            LoopEvent::Usage(usage) => Some(OutputEvent::Usage { usage }),
            LoopEvent::Completed { output } => Some(OutputEvent::Text {
                text: output.to_string(),
            }),
            LoopEvent::MaxTurnsExceeded | LoopEvent::Cancelled | LoopEvent::Failed { .. } => None,
        };
        if let Some(event) = translated {
            if output_tx.send(event).await.is_err() {
                return;
            }
        }
    }
    let _ = output_tx.send(OutputEvent::Complete).await;
}

fn outcome_to_result(outcome: LoopOutcome) -> TaskResult {
    match outcome {
        LoopOutcome::Completed(output) => TaskResult::Completed(output),
        LoopOutcome::MaxTurnsExceeded => TaskResult::Failed("max turns exceeded".to_string()),
        LoopOutcome::Cancelled => TaskResult::Cancelled,
        LoopOutcome::Failed(reason) => TaskResult::Failed(reason),
    }
}
