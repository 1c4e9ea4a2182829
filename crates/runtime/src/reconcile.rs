//! One reconciliation pass: scan → resolve → execute → rewrite.
//!
//! Idempotent per call id: a pass over an already-reconciled transcript
//! plans nothing and returns the transcript unchanged.

use std::collections::HashMap;

use chrono::Utc;

use ga_domain::config::ConfirmationConfig;
use ga_domain::error::Result;
use ga_domain::transcript::Message;
use ga_tools::{ExecutionContext, ToolRegistry};

use crate::resolver::{self, Anomaly};
use crate::rewriter;
use crate::runner::{self, ExecutionLedger, ResolvedCall};
use crate::scanner;

/// The result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// The rewritten transcript — this, not the input, goes to the model.
    pub transcript: Vec<Message>,
    /// Invocations resolved during this pass, in transcript order.
    pub resolved: Vec<ResolvedCall>,
    /// Call ids still awaiting a human decision.
    pub pending: Vec<String>,
    /// Invocations skipped as malformed or unknown.
    pub anomalies: Vec<Anomaly>,
}

/// Run one pass over `transcript`.
///
/// Per-invocation failures surface inside `resolved` as error outcomes;
/// the only fatal error is a structurally invalid transcript during the
/// rewrite.
pub async fn reconcile_pass(
    transcript: &[Message],
    registry: &ToolRegistry,
    context: &ExecutionContext,
    policy: &ConfirmationConfig,
    ledger: &ExecutionLedger,
) -> Result<PassOutcome> {
    let scanned = scanner::scan(transcript);
    let plan = resolver::resolve(transcript, &scanned, registry, policy, Utc::now());
    let resolved = runner::execute_plan(&plan, registry, context, ledger).await;

    let resolved_map: HashMap<_, _> = resolved
        .iter()
        .map(|r| (r.call_id.clone(), r.outcome.clone()))
        .collect();
    let rewritten = rewriter::rewrite(transcript, &resolved_map)?;

    Ok(PassOutcome {
        transcript: rewritten,
        resolved,
        pending: plan.pending,
        anomalies: plan.anomalies,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use ga_domain::transcript::{Decision, ToolInvocation};
    use ga_tools::builtins::builtin_registry;
    use serde_json::json;

    fn no_timeout() -> ConfirmationConfig {
        ConfirmationConfig { timeout_ms: None }
    }

    async fn pass(transcript: &[Message], ledger: &ExecutionLedger) -> PassOutcome {
        reconcile_pass(
            transcript,
            &builtin_registry(),
            &ExecutionContext::new(),
            &no_timeout(),
            ledger,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn undecided_pass_leaves_transcript_unchanged() {
        let transcript = vec![
            Message::user("weather in Paris?"),
            Message::assistant_with_calls(
                None,
                vec![ToolInvocation::call(
                    "getWeatherInformation",
                    "abc",
                    json!({"city": "Paris"}),
                )],
            ),
        ];
        let ledger = ExecutionLedger::new();

        let outcome = pass(&transcript, &ledger).await;
        assert!(outcome.resolved.is_empty());
        assert_eq!(outcome.pending, vec!["abc"]);
        assert_eq!(outcome.transcript.len(), transcript.len());

        // Arbitrarily many passes make no difference.
        let again = pass(&outcome.transcript, &ledger).await;
        assert!(again.resolved.is_empty());
        assert_eq!(again.pending, vec!["abc"]);
    }

    #[tokio::test]
    async fn approval_executes_and_splices() {
        let transcript = vec![
            Message::assistant_with_calls(
                None,
                vec![ToolInvocation::call(
                    "getWeatherInformation",
                    "abc",
                    json!({"city": "Paris"}),
                )],
            ),
            Message::decision("abc", Decision::Approve),
        ];
        let ledger = ExecutionLedger::new();

        let outcome = pass(&transcript, &ledger).await;
        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(
            outcome.resolved[0].outcome.content,
            json!("The weather in Paris is sunny")
        );
        assert!(outcome.pending.is_empty());

        // Monotonic: the next pass sees a resolved invocation and plans nothing.
        let again = pass(&outcome.transcript, &ledger).await;
        assert!(again.resolved.is_empty());
        assert!(again.pending.is_empty());
    }

    #[tokio::test]
    async fn auto_tool_resolves_without_decision() {
        let transcript = vec![Message::assistant_with_calls(
            None,
            vec![ToolInvocation::call(
                "getLocalTime",
                "t1",
                json!({"location": "Paris"}),
            )],
        )];

        let outcome = pass(&transcript, &ExecutionLedger::new()).await;
        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].outcome.content, json!("10am"));
    }

    #[tokio::test]
    async fn anomalies_do_not_abort_the_pass() {
        let transcript = vec![Message::assistant_with_calls(
            None,
            vec![
                ToolInvocation::call("noSuchTool", "x", json!({})),
                ToolInvocation::call("getLocalTime", "t1", json!({"location": "Paris"})),
            ],
        )];

        let outcome = pass(&transcript, &ExecutionLedger::new()).await;
        assert_eq!(outcome.anomalies.len(), 1);
        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].call_id, "t1");
    }
}
