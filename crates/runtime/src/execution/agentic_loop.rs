//! The bounded agentic execution loop (spec §4.9, invariants I9/I10).
//!
//! The teacher's `reasoning/phases.rs` models its much larger
//! observe-reason-gate-act cycle as a typestate machine
//! (`AgentLoop<Reasoning>` -> `PolicyCheck` -> `ToolDispatching` ->
//! `Observing`) with a policy gate, journal, and knowledge bridge in
//! between phases. This loop's scope is narrower — reason, optionally
//! call one allowed tool, observe, repeat until `maxTurns` or a final
//! answer — so it is written as a direct bounded loop over a
//! `Reasoner`/`ToolRegistry` pair instead of carrying the full phase
//! machinery; the turn-bounding and event-emission discipline is kept
//! from `reasoning/reasoning_loop.rs`'s `ReasoningLoopRunner`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::execution::backend::TokenUsage;
use crate::types::RuntimeResult;

/// Descriptor for a tool made available to the reasoner, surfaced to
/// backends that need to advertise their toolset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
}

/// What the reasoner decided to do on a given turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepDecision {
    CallTool {
        name: String,
        arguments: serde_json::Value,
    },
    Final {
        output: serde_json::Value,
    },
}

/// The reasoning step of the loop — typically a call into an LLM.
/// Returns the decision alongside the token usage that single call
/// consumed, following the teacher's `reasoning_loop.rs` pattern of
/// snapshotting usage before and after each reasoning phase.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn next_step(&self, history: &[serde_json::Value]) -> RuntimeResult<(StepDecision, TokenUsage)>;
}

/// The tool-calling surface available to a loop run. `allowed_tools`
/// bounds what the reasoner may invoke (I9: calling a tool outside this
/// list is rejected, not silently ignored).
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn allowed_tools(&self) -> Vec<String>;
    async fn call(&self, name: &str, arguments: serde_json::Value) -> RuntimeResult<serde_json::Value>;
}

/// Progress events emitted for the SSE layer to fan out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopEvent {
    Started,
    Turn { index: u32 },
    ToolCall { name: String, arguments: serde_json::Value },
    ToolResult { name: String, output: serde_json::Value, is_error: bool },
    /// Accumulated token usage across the run so far, emitted once
    /// immediately before the terminal event.
    Usage(TokenUsage),
    Completed { output: serde_json::Value },
    MaxTurnsExceeded,
    Cancelled,
    Failed { reason: String },
}

/// The terminal outcome of a loop run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopOutcome {
    Completed(serde_json::Value),
    MaxTurnsExceeded,
    Cancelled,
    Failed(String),
}

/// Drives a bounded reason/act/observe cycle, emitting [`LoopEvent`]s as
/// it goes.
pub struct AgenticLoop;

impl AgenticLoop {
    /// Run the loop to completion. `max_turns` bounds the number of
    /// reasoning steps (I10); a disallowed tool call or a cancellation
    /// signal on `cancel` ends the loop immediately.
    pub async fn run(
        reasoner: &dyn Reasoner,
        tools: &dyn ToolRegistry,
        initial_input: serde_json::Value,
        max_turns: u32,
        events: &mpsc::Sender<LoopEvent>,
        mut cancel: oneshot::Receiver<()>,
    ) -> LoopOutcome {
        let _ = events.send(LoopEvent::Started).await;
        let mut history = vec![initial_input];
        let mut usage = TokenUsage::default();

        for turn in 0..max_turns {
            if cancel.try_recv().is_ok() {
                let _ = events.send(LoopEvent::Usage(usage)).await;
                let _ = events.send(LoopEvent::Cancelled).await;
                return LoopOutcome::Cancelled;
            }

            let _ = events.send(LoopEvent::Turn { index: turn }).await;

            let (step, step_usage) = match reasoner.next_step(&history).await {
                Ok(step) => step,
                Err(err) => {
                    let reason = err.to_string();
                    let _ = events.send(LoopEvent::Usage(usage)).await;
                    let _ = events.send(LoopEvent::Failed { reason: reason.clone() }).await;
                    return LoopOutcome::Failed(reason);
                }
            };
            usage.accumulate(step_usage);

            match step {
                StepDecision::Final { output } => {
                    let _ = events.send(LoopEvent::Usage(usage)).await;
                    let _ = events
                        .send(LoopEvent::Completed {
                            output: output.clone(),
                        })
                        .await;
                    return LoopOutcome::Completed(output);
                }
                StepDecision::CallTool { name, arguments } => {
                    // maxTurns bounds reasoning steps, not tool rounds: a
                    // tool call decided on the final turn has no turn left
                    // to observe its result in, so it is never executed and
                    // the loop falls through to MaxTurnsExceeded below.
                    if turn + 1 >= max_turns {
                        break;
                    }

                    let _ = events
                        .send(LoopEvent::ToolCall {
                            name: name.clone(),
                            arguments: arguments.clone(),
                        })
                        .await;

                    if !tools.allowed_tools().iter().any(|allowed| allowed == &name) {
                        let output = serde_json::json!(format!("Unknown tool '{name}'"));
                        let _ = events
                            .send(LoopEvent::ToolResult {
                                name: name.clone(),
                                output: output.clone(),
                                is_error: true,
                            })
                            .await;
                        history.push(serde_json::json!({
                            "tool": name,
                            "output": output,
                            "is_error": true,
                        }));
                        continue;
                    }

                    match tools.call(&name, arguments).await {
                        Ok(output) => {
                            let _ = events
                                .send(LoopEvent::ToolResult {
                                    name: name.clone(),
                                    output: output.clone(),
                                    is_error: false,
                                })
                                .await;
                            history.push(serde_json::json!({"tool": name, "output": output}));
                        }
                        Err(err) => {
                            let reason = err.to_string();
                            let _ = events.send(LoopEvent::Usage(usage)).await;
                            let _ = events.send(LoopEvent::Failed { reason: reason.clone() }).await;
                            return LoopOutcome::Failed(reason);
                        }
                    }
                }
            }
        }

        let _ = events.send(LoopEvent::Usage(usage)).await;
        let _ = events.send(LoopEvent::MaxTurnsExceeded).await;
        LoopOutcome::MaxTurnsExceeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EchoReasoner {
        final_on_turn: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Reasoner for EchoReasoner {
        async fn next_step(&self, _history: &[serde_json::Value]) -> RuntimeResult<(StepDecision, TokenUsage)> {
            let turn = self.calls.fetch_add(1, Ordering::SeqCst);
            let usage = TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            };
            if turn >= self.final_on_turn {
                Ok((
                    StepDecision::Final {
                        output: serde_json::json!({"done": true}),
                    },
                    usage,
                ))
            } else {
                Ok((
                    StepDecision::CallTool {
                        name: "lookup".to_string(),
                        arguments: serde_json::json!({"turn": turn}),
                    },
                    usage,
                ))
            }
        }
    }

    struct AllowLookup;

    #[async_trait]
    impl ToolRegistry for AllowLookup {
        fn allowed_tools(&self) -> Vec<String> {
            vec!["lookup".to_string()]
        }
        async fn call(&self, _name: &str, arguments: serde_json::Value) -> RuntimeResult<serde_json::Value> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn completes_when_reasoner_returns_final() {
        let reasoner = EchoReasoner {
            final_on_turn: 0,
            calls: AtomicU32::new(0),
        };
        let tools = AllowLookup;
        let (tx, mut rx) = mpsc::channel(32);
        let (_cancel_tx, cancel_rx) = oneshot::channel();
        let outcome = AgenticLoop::run(
            &reasoner,
            &tools,
            serde_json::json!({}),
            4,
            &tx,
            cancel_rx,
        )
        .await;
        assert!(matches!(outcome, LoopOutcome::Completed(_)));
        drop(tx);
        let mut saw_started = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, LoopEvent::Started) {
                saw_started = true;
            }
        }
        assert!(saw_started);
    }

    #[tokio::test]
    async fn completes_on_the_final_turn_after_two_tool_rounds() {
        // maxTurns=3: two tool rounds, then a Final decision on the last
        // turn, so the run completes instead of exhausting its budget.
        let reasoner = EchoReasoner {
            final_on_turn: 2,
            calls: AtomicU32::new(0),
        };
        let tools = AllowLookup;
        let (tx, mut rx) = mpsc::channel(32);
        let (_cancel_tx, cancel_rx) = oneshot::channel();
        let outcome = AgenticLoop::run(&reasoner, &tools, serde_json::json!({}), 3, &tx, cancel_rx).await;
        assert!(matches!(outcome, LoopOutcome::Completed(_)));

        drop(tx);
        let mut tool_calls = 0;
        let mut tool_results = 0;
        while let Some(event) = rx.recv().await {
            match event {
                LoopEvent::ToolCall { .. } => tool_calls += 1,
                LoopEvent::ToolResult { .. } => tool_results += 1,
                _ => {}
            }
        }
        assert_eq!(tool_calls, 2);
        assert_eq!(tool_results, 2);
    }

    #[tokio::test]
    async fn stops_at_max_turns() {
        let reasoner = EchoReasoner {
            final_on_turn: 100,
            calls: AtomicU32::new(0),
        };
        let tools = AllowLookup;
        let (tx, _rx) = mpsc::channel(32);
        let (_cancel_tx, cancel_rx) = oneshot::channel();
        let outcome = AgenticLoop::run(&reasoner, &tools, serde_json::json!({}), 3, &tx, cancel_rx).await;
        assert!(matches!(outcome, LoopOutcome::MaxTurnsExceeded));
    }

    #[tokio::test]
    async fn disallowed_tool_call_continues_the_loop_with_an_error_result() {
        struct ForbiddenReasoner;
        #[async_trait]
        impl Reasoner for ForbiddenReasoner {
            async fn next_step(&self, _history: &[serde_json::Value]) -> RuntimeResult<(StepDecision, TokenUsage)> {
                Ok((
                    StepDecision::CallTool {
                        name: "delete_everything".to_string(),
                        arguments: serde_json::json!({}),
                    },
                    TokenUsage::default(),
                ))
            }
        }
        let reasoner = ForbiddenReasoner;
        let tools = AllowLookup;
        let (tx, mut rx) = mpsc::channel(32);
        let (_cancel_tx, cancel_rx) = oneshot::channel();
        let outcome = AgenticLoop::run(&reasoner, &tools, serde_json::json!({}), 3, &tx, cancel_rx).await;
        // the reasoner never produces a Final decision, so the loop still
        // runs out of turns rather than failing outright.
        assert!(matches!(outcome, LoopOutcome::MaxTurnsExceeded));

        drop(tx);
        let mut error_results = 0;
        while let Some(event) = rx.recv().await {
            if let LoopEvent::ToolResult { output, is_error, .. } = event {
                assert!(is_error);
                assert!(output.as_str().unwrap().starts_with("Unknown tool"));
                error_results += 1;
            }
        }
        assert_eq!(error_results, 2, "one error result per tool round before the final turn");
    }

    #[tokio::test]
    async fn tool_round_is_not_executed_on_the_final_turn() {
        let reasoner = EchoReasoner {
            final_on_turn: 100,
            calls: AtomicU32::new(0),
        };
        let tools = AllowLookup;
        let (tx, mut rx) = mpsc::channel(32);
        let (_cancel_tx, cancel_rx) = oneshot::channel();
        let outcome = AgenticLoop::run(&reasoner, &tools, serde_json::json!({}), 3, &tx, cancel_rx).await;
        assert!(matches!(outcome, LoopOutcome::MaxTurnsExceeded));

        drop(tx);
        let mut tool_calls = 0;
        let mut tool_results = 0;
        while let Some(event) = rx.recv().await {
            match event {
                LoopEvent::ToolCall { .. } => tool_calls += 1,
                LoopEvent::ToolResult { .. } => tool_results += 1,
                _ => {}
            }
        }
        assert_eq!(tool_calls, 2, "maxTurns=3 allows at most N-1 tool rounds");
        assert_eq!(tool_results, 2);
    }

    #[tokio::test]
    async fn usage_accumulates_across_turns_and_is_emitted_once() {
        let reasoner = EchoReasoner {
            final_on_turn: 2,
            calls: AtomicU32::new(0),
        };
        let tools = AllowLookup;
        let (tx, mut rx) = mpsc::channel(32);
        let (_cancel_tx, cancel_rx) = oneshot::channel();
        AgenticLoop::run(&reasoner, &tools, serde_json::json!({}), 3, &tx, cancel_rx).await;

        drop(tx);
        let mut usage_events = Vec::new();
        while let Some(event) = rx.recv().await {
            if let LoopEvent::Usage(usage) = event {
                usage_events.push(usage);
            }
        }
        assert_eq!(usage_events.len(), 1, "usage is emitted exactly once, right before the terminal event");
        assert_eq!(usage_events[0].total_tokens, 45);
    }

    #[tokio::test]
    async fn cancellation_before_any_turn_stops_the_loop() {
        let reasoner = EchoReasoner {
            final_on_turn: 100,
            calls: AtomicU32::new(0),
        };
        let tools = AllowLookup;
        let (tx, _rx) = mpsc::channel(32);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        cancel_tx.send(()).unwrap();
        let outcome = AgenticLoop::run(&reasoner, &tools, serde_json::json!({}), 5, &tx, cancel_rx).await;
        assert!(matches!(outcome, LoopOutcome::Cancelled));
    }
}
