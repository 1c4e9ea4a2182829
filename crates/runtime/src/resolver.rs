//! Confirmation resolver — plans what happens to each unresolved tool
//! invocation this pass.
//!
//! Pure: it looks at the transcript and the registry and produces a
//! [`ResolutionPlan`]; executing the plan is the runner's job. For each
//! invocation still in the `call` state:
//! - auto tools are scheduled to run immediately;
//! - gated tools are scheduled only once an approval decision exists;
//! - a rejection settles the invocation to the rejection sentinel with no
//!   execution;
//! - no decision leaves it pending (or settles it to the timeout sentinel
//!   once the configured confirmation timeout has elapsed);
//! - unknown tools and malformed arguments are anomalies, skipped without
//!   aborting the pass.

use chrono::{DateTime, Utc};

use ga_domain::config::ConfirmationConfig;
use ga_domain::transcript::{Decision, Message, Part, ToolInvocation, ToolOutcome};
use ga_tools::{ToolHandler, ToolRegistry};

use crate::scanner::ScannedCall;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Plan types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One planned step, in transcript order.
#[derive(Debug, Clone)]
pub enum PlannedAction {
    /// Run the tool's execution function (auto tool, or gated + approved).
    Execute(ToolInvocation),
    /// Record an outcome without running anything (rejection, timeout).
    Settle {
        call_id: String,
        tool_name: String,
        outcome: ToolOutcome,
    },
}

/// Why an invocation was skipped this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalyReason {
    UnknownTool,
    MalformedArguments,
}

#[derive(Debug, Clone)]
pub struct Anomaly {
    pub call_id: String,
    pub tool_name: String,
    pub reason: AnomalyReason,
}

/// The resolver's output for one pass.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    /// Steps to take, in transcript order.
    pub actions: Vec<PlannedAction>,
    /// Call ids still awaiting a human decision.
    pub pending: Vec<String>,
    /// Invocations skipped as malformed or unknown.
    pub anomalies: Vec<Anomaly>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Decision lookup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Find the decision for `call_id` in messages strictly after `after_idx`.
///
/// The earliest decision in transcript order wins; later duplicates are
/// ignored.
pub(crate) fn find_decision(
    transcript: &[Message],
    after_idx: usize,
    call_id: &str,
) -> Option<Decision> {
    transcript
        .iter()
        .skip(after_idx + 1)
        .flat_map(|m| m.parts.iter())
        .find_map(|part| match part {
            Part::Decision {
                call_id: id,
                decision,
            } if id == call_id => Some(*decision),
            _ => None,
        })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Plan this pass's actions for every scanned invocation.
pub fn resolve(
    transcript: &[Message],
    scanned: &[ScannedCall],
    registry: &ToolRegistry,
    policy: &ConfirmationConfig,
    now: DateTime<Utc>,
) -> ResolutionPlan {
    let mut plan = ResolutionPlan::default();

    for call in scanned {
        let inv = &call.invocation;
        if inv.is_resolved() {
            continue;
        }

        if !inv.arguments.is_object() {
            tracing::warn!(call_id = %inv.call_id, tool = %inv.tool_name, "malformed tool arguments");
            plan.anomalies.push(Anomaly {
                call_id: inv.call_id.clone(),
                tool_name: inv.tool_name.clone(),
                reason: AnomalyReason::MalformedArguments,
            });
            continue;
        }

        let Some(descriptor) = registry.get(&inv.tool_name) else {
            tracing::warn!(call_id = %inv.call_id, tool = %inv.tool_name, "unknown tool");
            plan.anomalies.push(Anomaly {
                call_id: inv.call_id.clone(),
                tool_name: inv.tool_name.clone(),
                reason: AnomalyReason::UnknownTool,
            });
            continue;
        };

        match &descriptor.handler {
            ToolHandler::Auto(_) => {
                plan.actions.push(PlannedAction::Execute(inv.clone()));
            }
            ToolHandler::Gated(_) => {
                match find_decision(transcript, call.message_idx, &inv.call_id) {
                    Some(Decision::Approve) => {
                        plan.actions.push(PlannedAction::Execute(inv.clone()));
                    }
                    Some(Decision::Reject) => {
                        plan.actions.push(PlannedAction::Settle {
                            call_id: inv.call_id.clone(),
                            tool_name: inv.tool_name.clone(),
                            outcome: ToolOutcome::rejected(),
                        });
                    }
                    None => {
                        let asked_at = transcript[call.message_idx].timestamp;
                        if confirmation_expired(policy, asked_at, now) {
                            plan.actions.push(PlannedAction::Settle {
                                call_id: inv.call_id.clone(),
                                tool_name: inv.tool_name.clone(),
                                outcome: ToolOutcome::timed_out(),
                            });
                        } else {
                            plan.pending.push(inv.call_id.clone());
                        }
                    }
                }
            }
        }
    }

    plan
}

fn confirmation_expired(
    policy: &ConfirmationConfig,
    asked_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    match policy.timeout_ms {
        Some(timeout_ms) => {
            let elapsed = now.signed_duration_since(asked_at).num_milliseconds();
            elapsed >= 0 && elapsed as u64 >= timeout_ms
        }
        None => false,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
