//! Model-invocation service adapters for GateAgent.
//!
//! The runtime talks to [`LlmProvider`]; adapters translate to a concrete
//! provider's wire format.

mod openai_compat;
mod sse;
mod traits;
mod util;

pub use openai_compat::OpenAiCompatProvider;
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
