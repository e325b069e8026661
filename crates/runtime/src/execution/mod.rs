//! Execution backend contract, circuit breaker, backend registry,
//! provider router, and the bounded agentic execution loop.

pub mod agentic_backend;
pub mod agentic_loop;
pub mod backend;
pub mod circuit_breaker;
pub mod registry;
pub mod router;

pub use agentic_backend::AgenticLoopBackend;
pub use agentic_loop::{AgenticLoop, LoopEvent, LoopOutcome, Reasoner, StepDecision, Tool, ToolRegistry};
pub use backend::{Capabilities, ExecutionBackend, ExecutionTask, Handle, OutputEvent, TaskResult, TokenUsage};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use registry::BackendRegistry;
pub use router::{Candidate, ProviderRouter, RoutingConstraints};
