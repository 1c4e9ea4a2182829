use std::collections::HashMap;

/// Ambient environment threaded through to each tool's execution function.
///
/// The host process supplies credentials, endpoints, and other runtime
/// handles as opaque key/value pairs; the pipeline never interprets them.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    env: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }
}
