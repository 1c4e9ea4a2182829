//! Shared domain types for GateAgent: the transcript data model, tool
//! definitions, stream events, configuration, and the common error type.

pub mod config;
pub mod error;
pub mod stream;
pub mod tool;
pub mod transcript;
