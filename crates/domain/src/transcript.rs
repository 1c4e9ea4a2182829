//! The conversation transcript data model.
//!
//! A transcript is an ordered `Vec<Message>`. Messages are immutable once
//! appended; the only mutation the pipeline performs is producing a *new*
//! transcript with tool-invocation parts replaced in place once resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<Part>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Part {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_invocation")]
    ToolInvocation(ToolInvocation),

    /// A human decision for one tool invocation, keyed by call id.
    ///
    /// Carried as an ordinary message part so decisions arrive through the
    /// same append-only channel as everything else.
    #[serde(rename = "decision")]
    Decision { call_id: String, decision: Decision },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool invocations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool call proposed by the model, and eventually its result.
///
/// The call id is unique across the transcript. State moves `call` →
/// `result` exactly once and never back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub call_id: String,
    pub arguments: Value,
    #[serde(flatten)]
    pub state: InvocationState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum InvocationState {
    Call,
    Result { outcome: ToolOutcome },
}

/// The recorded result of a tool invocation.
///
/// Execution failures are outcomes too (`is_error: true`) — the model sees
/// the failure and can react to it; nothing crashes the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub content: Value,
    #[serde(default)]
    pub is_error: bool,
}

/// Sentinel content recorded when a human rejects an invocation.
pub const REJECTED_SENTINEL: &str = "Error: user denied tool execution";

/// Sentinel content recorded when a pending confirmation exceeds the
/// configured timeout.
pub const TIMEOUT_SENTINEL: &str = "Error: confirmation request expired";

impl ToolOutcome {
    pub fn success(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: Value::String(message.into()),
            is_error: true,
        }
    }

    /// The fixed rejection outcome. No execution ever happened.
    pub fn rejected() -> Self {
        Self::error(REJECTED_SENTINEL)
    }

    /// The fixed timeout outcome for expired confirmations.
    pub fn timed_out() -> Self {
        Self::error(TIMEOUT_SENTINEL)
    }
}

impl ToolInvocation {
    pub fn call(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            arguments,
            state: InvocationState::Call,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, InvocationState::Result { .. })
    }

    /// A copy of this invocation moved to the `result` state.
    ///
    /// The `call → result` transition is terminal; resolving an
    /// already-resolved invocation returns it unchanged.
    pub fn resolved(&self, outcome: ToolOutcome) -> Self {
        if self.is_resolved() {
            tracing::warn!(
                call_id = %self.call_id,
                "attempt to resolve an already-resolved invocation; keeping first result"
            );
            return self.clone();
        }
        Self {
            state: InvocationState::Result { outcome },
            ..self.clone()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Convenience constructors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Message {
    fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            parts,
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::Text { text: text.into() }])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::Text { text: text.into() }])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Part::Text { text: text.into() }])
    }

    /// An assistant message carrying proposed tool calls (and optional text).
    pub fn assistant_with_calls(text: Option<String>, calls: Vec<ToolInvocation>) -> Self {
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            parts.push(Part::Text { text });
        }
        parts.extend(calls.into_iter().map(Part::ToolInvocation));
        Self::new(Role::Assistant, parts)
    }

    /// A user message carrying a decision for one call id.
    pub fn decision(call_id: impl Into<String>, decision: Decision) -> Self {
        Self::new(
            Role::User,
            vec![Part::Decision {
                call_id: call_id.into(),
                decision,
            }],
        )
    }

    /// The concatenated plain text of this message, if any.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invocation_starts_unresolved() {
        let inv = ToolInvocation::call("getLocalTime", "c1", json!({"location": "Paris"}));
        assert!(!inv.is_resolved());
    }

    #[test]
    fn resolve_is_terminal() {
        let inv = ToolInvocation::call("getLocalTime", "c1", json!({}));
        let first = inv.resolved(ToolOutcome::success(json!("10am")));
        assert!(first.is_resolved());

        // A second resolution keeps the first outcome.
        let second = first.resolved(ToolOutcome::error("later"));
        match second.state {
            InvocationState::Result { outcome } => {
                assert_eq!(outcome.content, json!("10am"));
                assert!(!outcome.is_error);
            }
            InvocationState::Call => panic!("expected result state"),
        }
    }

    #[test]
    fn rejection_sentinel_is_error() {
        let outcome = ToolOutcome::rejected();
        assert!(outcome.is_error);
        assert_eq!(outcome.content, json!(REJECTED_SENTINEL));
    }

    #[test]
    fn invocation_serde_round_trip() {
        let inv = ToolInvocation::call("getWeatherInformation", "abc", json!({"city": "Paris"}));
        let v = serde_json::to_value(&inv).unwrap();
        assert_eq!(v["state"], json!("call"));
        let back: ToolInvocation = serde_json::from_value(v).unwrap();
        assert_eq!(back.call_id, "abc");
        assert!(!back.is_resolved());
    }

    #[test]
    fn part_serde_tags() {
        let msg = Message::decision("abc", Decision::Approve);
        let v = serde_json::to_value(&msg.parts[0]).unwrap();
        assert_eq!(v["type"], json!("decision"));
        assert_eq!(v["decision"], json!("approve"));
    }

    #[test]
    fn message_text_joins_text_parts_only() {
        let mut msg = Message::user("hello");
        msg.parts.push(Part::ToolInvocation(ToolInvocation::call(
            "getLocalTime",
            "c9",
            json!({}),
        )));
        assert_eq!(msg.text().as_deref(), Some("hello"));
    }
}
