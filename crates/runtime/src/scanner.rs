//! Invocation scanner — walks a transcript and lists every tool-invocation
//! part in order.
//!
//! Pure and stable: scanning the same transcript twice yields identical
//! results, which is what makes re-running the reconciliation pass on
//! every response cycle idempotent.

use ga_domain::transcript::{Message, Part, ToolInvocation};

/// One tool-invocation part found in the transcript, with its position.
#[derive(Debug, Clone)]
pub struct ScannedCall {
    pub message_idx: usize,
    pub part_idx: usize,
    pub invocation: ToolInvocation,
}

/// List every tool-invocation part in transcript order (oldest first),
/// regardless of state. No mutation.
pub fn scan(transcript: &[Message]) -> Vec<ScannedCall> {
    let mut calls = Vec::new();
    for (message_idx, message) in transcript.iter().enumerate() {
        for (part_idx, part) in message.parts.iter().enumerate() {
            if let Part::ToolInvocation(invocation) = part {
                calls.push(ScannedCall {
                    message_idx,
                    part_idx,
                    invocation: invocation.clone(),
                });
            }
        }
    }
    calls
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use ga_domain::transcript::{Decision, ToolOutcome};
    use serde_json::json;

    fn sample_transcript() -> Vec<Message> {
        vec![
            Message::user("what's the weather?"),
            Message::assistant_with_calls(
                Some("let me check".into()),
                vec![
                    ToolInvocation::call("getWeatherInformation", "c1", json!({"city": "Paris"})),
                    ToolInvocation::call("getLocalTime", "c2", json!({"location": "Paris"})),
                ],
            ),
            Message::decision("c1", Decision::Approve),
            Message::assistant_with_calls(
                None,
                vec![ToolInvocation::call("getLocalTime", "c3", json!({}))
                    .resolved(ToolOutcome::success(json!("10am")))],
            ),
        ]
    }

    #[test]
    fn finds_all_invocations_in_order() {
        let transcript = sample_transcript();
        let calls = scan(&transcript);

        let ids: Vec<&str> = calls.iter().map(|c| c.invocation.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(calls[0].message_idx, 1);
        assert_eq!(calls[0].part_idx, 1); // after the text part
        assert_eq!(calls[1].part_idx, 2);
        assert_eq!(calls[2].message_idx, 3);
    }

    #[test]
    fn includes_resolved_invocations() {
        let calls = scan(&sample_transcript());
        assert!(calls[2].invocation.is_resolved());
        assert!(!calls[0].invocation.is_resolved());
    }

    #[test]
    fn rescan_is_stable() {
        let transcript = sample_transcript();
        let a = scan(&transcript);
        let b = scan(&transcript);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.message_idx, y.message_idx);
            assert_eq!(x.part_idx, y.part_idx);
            assert_eq!(x.invocation.call_id, y.invocation.call_id);
        }
    }

    #[test]
    fn text_only_transcript_yields_nothing() {
        let transcript = vec![Message::user("hi"), Message::assistant("hello")];
        assert!(scan(&transcript).is_empty());
    }
}
