//! Transcript rewriter — splices resolved results back into the
//! conversation.
//!
//! Produces a new transcript in which every invocation part whose call id
//! was resolved this pass is replaced by the same part in the `result`
//! state. Everything else, including ordering, is unchanged. This output,
//! not the raw transcript, is what goes to the model-invocation service.

use std::collections::{HashMap, HashSet};

use ga_domain::error::{Error, Result};
use ga_domain::transcript::{Message, Part, ToolOutcome};

/// Rewrite `transcript` with `resolved` outcomes spliced in.
///
/// A call id matching more than one invocation part means the transcript
/// has lost its uniqueness invariant; that is fatal to the turn
/// ([`Error::Transcript`]). A resolved id with no matching part, or one
/// whose part is already in the `result` state, is logged and skipped.
pub fn rewrite(
    transcript: &[Message],
    resolved: &HashMap<String, ToolOutcome>,
) -> Result<Vec<Message>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut applied: HashSet<String> = HashSet::new();

    let mut out = Vec::with_capacity(transcript.len());
    for message in transcript {
        let mut parts = Vec::with_capacity(message.parts.len());
        for part in &message.parts {
            let rewritten = match part {
                Part::ToolInvocation(inv) => {
                    if !seen.insert(inv.call_id.clone()) {
                        return Err(Error::Transcript(format!(
                            "call id {} appears in more than one invocation",
                            inv.call_id
                        )));
                    }
                    match resolved.get(&inv.call_id) {
                        Some(outcome) if !inv.is_resolved() => {
                            applied.insert(inv.call_id.clone());
                            Part::ToolInvocation(inv.resolved(outcome.clone()))
                        }
                        Some(_) => {
                            // Already resolved: first result wins, no-op.
                            tracing::warn!(call_id = %inv.call_id, "duplicate resolution ignored");
                            part.clone()
                        }
                        None => part.clone(),
                    }
                }
                other => other.clone(),
            };
            parts.push(rewritten);
        }
        out.push(Message {
            id: message.id.clone(),
            role: message.role,
            parts,
            timestamp: message.timestamp,
        });
    }

    for call_id in resolved.keys() {
        if !applied.contains(call_id) && !seen.contains(call_id) {
            tracing::warn!(%call_id, "resolved call id has no matching invocation");
        }
    }

    Ok(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;
    use ga_domain::transcript::{InvocationState, ToolInvocation};
    use serde_json::json;

    fn transcript_with_call(call_id: &str) -> Vec<Message> {
        vec![
            Message::user("what's the weather in Paris?"),
            Message::assistant_with_calls(
                None,
                vec![ToolInvocation::call(
                    "getWeatherInformation",
                    call_id,
                    json!({"city": "Paris"}),
                )],
            ),
        ]
    }

    fn resolved_map(call_id: &str, outcome: ToolOutcome) -> HashMap<String, ToolOutcome> {
        HashMap::from([(call_id.to_owned(), outcome)])
    }

    #[test]
    fn splices_result_in_place() {
        let transcript = transcript_with_call("abc");
        let outcome = ToolOutcome::success(json!("The weather in Paris is sunny"));

        let rewritten = rewrite(&transcript, &resolved_map("abc", outcome.clone())).unwrap();

        assert_eq!(rewritten.len(), transcript.len());
        assert_eq!(rewritten[1].id, transcript[1].id);
        match &rewritten[1].parts[0] {
            Part::ToolInvocation(inv) => match &inv.state {
                InvocationState::Result { outcome: got } => assert_eq!(*got, outcome),
                InvocationState::Call => panic!("expected result state"),
            },
            other => panic!("expected invocation part, got {other:?}"),
        }
    }

    #[test]
    fn untouched_content_is_preserved() {
        let transcript = transcript_with_call("abc");
        let rewritten = rewrite(&transcript, &HashMap::new()).unwrap();

        assert_eq!(rewritten[0].text(), transcript[0].text());
        match &rewritten[1].parts[0] {
            Part::ToolInvocation(inv) => assert!(!inv.is_resolved()),
            other => panic!("expected invocation part, got {other:?}"),
        }
    }

    #[test]
    fn rescan_shows_no_resolved_id_in_call_state() {
        let transcript = transcript_with_call("abc");
        let resolved = resolved_map("abc", ToolOutcome::success(json!("sunny")));
        let rewritten = rewrite(&transcript, &resolved).unwrap();

        let still_open: Vec<_> = scan(&rewritten)
            .into_iter()
            .filter(|c| !c.invocation.is_resolved() && resolved.contains_key(&c.invocation.call_id))
            .collect();
        assert!(still_open.is_empty());
    }

    #[test]
    fn duplicate_call_id_is_fatal() {
        let mut transcript = transcript_with_call("abc");
        transcript.push(Message::assistant_with_calls(
            None,
            vec![ToolInvocation::call(
                "getWeatherInformation",
                "abc",
                json!({"city": "Lyon"}),
            )],
        ));

        let err = rewrite(&transcript, &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::Transcript(_)));
    }

    #[test]
    fn already_resolved_part_keeps_first_result() {
        let transcript = vec![Message::assistant_with_calls(
            None,
            vec![
                ToolInvocation::call("getLocalTime", "t1", json!({}))
                    .resolved(ToolOutcome::success(json!("10am"))),
            ],
        )];

        let rewritten =
            rewrite(&transcript, &resolved_map("t1", ToolOutcome::error("late"))).unwrap();
        match &rewritten[0].parts[0] {
            Part::ToolInvocation(inv) => match &inv.state {
                InvocationState::Result { outcome } => assert_eq!(outcome.content, json!("10am")),
                InvocationState::Call => panic!("expected result state"),
            },
            other => panic!("expected invocation part, got {other:?}"),
        }
    }

    #[test]
    fn unknown_resolved_id_is_skipped() {
        let transcript = transcript_with_call("abc");
        let rewritten =
            rewrite(&transcript, &resolved_map("nope", ToolOutcome::rejected())).unwrap();
        assert_eq!(rewritten.len(), transcript.len());
    }
}
