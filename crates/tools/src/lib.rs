//! Tool registry and built-in tools for GateAgent.
//!
//! A tool is either `Auto` (runs as soon as the model proposes it) or
//! `Gated` (held for explicit human approval). The registry maps tool
//! names to parameter schemas and execution functions.

pub mod builtins;
pub mod context;
pub mod registry;

pub use context::ExecutionContext;
pub use registry::{ExecuteFn, ToolDescriptor, ToolHandler, ToolRegistry};
