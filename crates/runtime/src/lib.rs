//! Control-plane runtime for agent orchestration: lifecycle management,
//! execution backend routing, the agentic execution loop, human
//! approvals, and SSE fan-out.
//!
//! Each concern lives in its own module and is composed by callers
//! (typically the `agentctl` binary) rather than by one god object —
//! see `DESIGN.md` for how each module is grounded.

pub mod api;
pub mod approval;
pub mod config;
pub mod execution;
pub mod lifecycle;
pub mod prelude;
pub mod sse;
pub mod types;

pub use config::Config;
pub use types::{RuntimeError, RuntimeResult};
