//! Execution runner — carries out the resolver's plan.
//!
//! Planned executions for different call ids are independent and run
//! concurrently; results come back in plan (transcript) order. A tool
//! failure is captured as an error outcome and delivered to the model like
//! any other result — it never aborts the pass.

use std::collections::HashSet;

use parking_lot::RwLock;

use ga_domain::transcript::{ToolInvocation, ToolOutcome};
use ga_tools::{ExecutionContext, ToolRegistry};

use crate::resolver::{PlannedAction, ResolutionPlan};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution ledger
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide record of call ids whose execution function has run.
///
/// The state machine already guarantees at-most-once execution when the
/// transcript round-trips correctly (only `call`-state invocations are
/// planned). The ledger holds the line even when a caller replays a stale
/// transcript that still shows an executed call as unresolved.
#[derive(Debug, Default)]
pub struct ExecutionLedger {
    executed: RwLock<HashSet<String>>,
}

impl ExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a call id for execution. Returns `false` if it already ran.
    fn try_claim(&self, call_id: &str) -> bool {
        self.executed.write().insert(call_id.to_owned())
    }

    pub fn has_executed(&self, call_id: &str) -> bool {
        self.executed.read().contains(call_id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One invocation resolved during a pass, with its recorded outcome.
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

/// Execute a pass's plan: run every `Execute` action concurrently, pass
/// `Settle` outcomes through, and return resolved calls in plan order.
pub async fn execute_plan(
    plan: &ResolutionPlan,
    registry: &ToolRegistry,
    context: &ExecutionContext,
    ledger: &ExecutionLedger,
) -> Vec<ResolvedCall> {
    // Latency is max(tool latencies) rather than the sum; join_all keeps
    // results in the original order.
    let futures: Vec<_> = plan
        .actions
        .iter()
        .map(|action| run_action(action, registry, context, ledger))
        .collect();

    futures_util::future::join_all(futures)
        .await
        .into_iter()
        .flatten()
        .collect()
}

async fn run_action(
    action: &PlannedAction,
    registry: &ToolRegistry,
    context: &ExecutionContext,
    ledger: &ExecutionLedger,
) -> Option<ResolvedCall> {
    match action {
        PlannedAction::Settle {
            call_id,
            tool_name,
            outcome,
        } => Some(ResolvedCall {
            call_id: call_id.clone(),
            tool_name: tool_name.clone(),
            outcome: outcome.clone(),
        }),
        PlannedAction::Execute(invocation) => execute_one(invocation, registry, context, ledger).await,
    }
}

async fn execute_one(
    invocation: &ToolInvocation,
    registry: &ToolRegistry,
    context: &ExecutionContext,
    ledger: &ExecutionLedger,
) -> Option<ResolvedCall> {
    let descriptor = registry.get(&invocation.tool_name)?;

    if !ledger.try_claim(&invocation.call_id) {
        // Already ran in a prior pass; the recorded result lives in the
        // transcript, so re-resolution is a no-op.
        tracing::warn!(
            call_id = %invocation.call_id,
            tool = %invocation.tool_name,
            "suppressing duplicate execution"
        );
        return None;
    }

    tracing::debug!(call_id = %invocation.call_id, tool = %invocation.tool_name, "executing tool");

    let execute = descriptor.handler.execute_fn().clone();
    let outcome = match execute(invocation.arguments.clone(), context.clone()).await {
        Ok(content) => ToolOutcome::success(content),
        Err(e) => {
            tracing::warn!(
                call_id = %invocation.call_id,
                tool = %invocation.tool_name,
                error = %e,
                "tool execution failed"
            );
            ToolOutcome::error(e.to_string())
        }
    };

    Some(ResolvedCall {
        call_id: invocation.call_id.clone(),
        tool_name: invocation.tool_name.clone(),
        outcome,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
