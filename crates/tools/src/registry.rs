//! Static tool registry — maps tool names to parameter schemas and
//! execution functions.
//!
//! Tools come in two flavors: `Auto` tools run as soon as the model
//! proposes them, `Gated` tools are held until a human approves the call.
//! The registry itself is read-only after construction and has no side
//! effects.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use ga_domain::error::Result;
use ga_domain::stream::BoxFuture;
use ga_domain::tool::ToolDefinition;

use crate::context::ExecutionContext;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool's execution function: structured arguments plus ambient context
/// in, result payload out. Failures are ordinary `Err` values; the runner
/// turns them into error outcomes, never a crash.
pub type ExecuteFn =
    Arc<dyn Fn(Value, ExecutionContext) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// How a tool's execution is triggered.
#[derive(Clone)]
pub enum ToolHandler {
    /// Trusted to run as soon as the model proposes the call.
    Auto(ExecuteFn),
    /// Requires an explicit human approval; the function runs only after
    /// an approval decision arrives for the call id.
    Gated(ExecuteFn),
}

impl ToolHandler {
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::Gated(_))
    }

    pub fn execute_fn(&self) -> &ExecuteFn {
        match self {
            Self::Auto(f) | Self::Gated(f) => f,
        }
    }
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto(_) => f.write_str("Auto(..)"),
            Self::Gated(_) => f.write_str("Gated(..)"),
        }
    }
}

/// One registered tool: name, parameter schema, and handler.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
    pub handler: ToolHandler,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Name → descriptor map. BTreeMap keeps `definitions()` deterministic.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) {
        if self.tools.contains_key(&descriptor.name) {
            tracing::warn!(tool = %descriptor.name, "re-registering tool; replacing descriptor");
        }
        self.tools.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Whether this tool is gated on human confirmation.
    /// Unknown tools return `false`; they are anomalies, not pending work.
    pub fn requires_confirmation(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .is_some_and(|d| d.handler.requires_confirmation())
    }

    /// The tool schema set handed to the model-invocation service.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|d| ToolDefinition {
                name: d.name.clone(),
                description: d.description.clone(),
                parameters: d.parameters.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> ExecuteFn {
        Arc::new(|_args, _ctx| Box::pin(async { Ok(json!(null)) }))
    }

    fn descriptor(name: &str, handler: ToolHandler) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: format!("{name} test tool"),
            parameters: json!({"type": "object", "properties": {}}),
            handler,
        }
    }

    #[test]
    fn gated_tools_require_confirmation() {
        let mut reg = ToolRegistry::new();
        reg.register(descriptor("a", ToolHandler::Auto(noop())));
        reg.register(descriptor("g", ToolHandler::Gated(noop())));

        assert!(!reg.requires_confirmation("a"));
        assert!(reg.requires_confirmation("g"));
        assert!(!reg.requires_confirmation("unknown"));
    }

    #[test]
    fn definitions_are_deterministic() {
        let mut reg = ToolRegistry::new();
        reg.register(descriptor("zeta", ToolHandler::Auto(noop())));
        reg.register(descriptor("alpha", ToolHandler::Gated(noop())));

        let names: Vec<String> = reg.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn re_register_replaces() {
        let mut reg = ToolRegistry::new();
        reg.register(descriptor("t", ToolHandler::Auto(noop())));
        reg.register(descriptor("t", ToolHandler::Gated(noop())));
        assert_eq!(reg.len(), 1);
        assert!(reg.requires_confirmation("t"));
    }
}
