//! Pending-confirmation derivation.
//!
//! The pending set is never stored; it is recomputed from the transcript
//! on demand. While it is non-empty the consumer must keep user input
//! disabled — that is the system-wide input gate.

use ga_domain::transcript::Message;
use ga_tools::ToolRegistry;

use crate::resolver::find_decision;
use crate::scanner::scan;

/// Call ids in the `call` state whose tool is confirmation-gated and for
/// which no decision exists yet, in transcript order.
pub fn pending_confirmations(transcript: &[Message], registry: &ToolRegistry) -> Vec<String> {
    scan(transcript)
        .into_iter()
        .filter(|call| {
            !call.invocation.is_resolved()
                && registry.requires_confirmation(&call.invocation.tool_name)
                && find_decision(transcript, call.message_idx, &call.invocation.call_id).is_none()
        })
        .map(|call| call.invocation.call_id)
        .collect()
}

/// Whether any invocation anywhere in the transcript is awaiting a human
/// decision.
pub fn has_pending_confirmation(transcript: &[Message], registry: &ToolRegistry) -> bool {
    !pending_confirmations(transcript, registry).is_empty()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use ga_domain::transcript::{Decision, ToolInvocation, ToolOutcome};
    use ga_tools::builtins::builtin_registry;
    use serde_json::json;

    fn gated_call(call_id: &str) -> Message {
        Message::assistant_with_calls(
            None,
            vec![ToolInvocation::call(
                "getWeatherInformation",
                call_id,
                json!({"city": "Paris"}),
            )],
        )
    }

    #[test]
    fn gated_call_without_decision_is_pending() {
        let registry = builtin_registry();
        let transcript = vec![Message::user("weather?"), gated_call("abc")];

        assert_eq!(pending_confirmations(&transcript, &registry), vec!["abc"]);
        assert!(has_pending_confirmation(&transcript, &registry));
    }

    #[test]
    fn decision_clears_pending() {
        let registry = builtin_registry();
        let transcript = vec![
            gated_call("abc"),
            Message::decision("abc", Decision::Approve),
        ];

        assert!(pending_confirmations(&transcript, &registry).is_empty());
    }

    #[test]
    fn auto_tools_are_never_pending() {
        let registry = builtin_registry();
        let transcript = vec![Message::assistant_with_calls(
            None,
            vec![ToolInvocation::call(
                "getLocalTime",
                "t1",
                json!({"location": "Paris"}),
            )],
        )];

        assert!(!has_pending_confirmation(&transcript, &registry));
    }

    #[test]
    fn resolved_gated_call_is_not_pending() {
        let registry = builtin_registry();
        let transcript = vec![Message::assistant_with_calls(
            None,
            vec![
                ToolInvocation::call("getWeatherInformation", "abc", json!({"city": "Paris"}))
                    .resolved(ToolOutcome::success(json!("sunny"))),
            ],
        )];

        assert!(!has_pending_confirmation(&transcript, &registry));
    }

    #[test]
    fn unknown_tools_do_not_wedge_the_gate() {
        let registry = builtin_registry();
        let transcript = vec![Message::assistant_with_calls(
            None,
            vec![ToolInvocation::call("noSuchTool", "x", json!({}))],
        )];

        assert!(!has_pending_confirmation(&transcript, &registry));
    }
}
