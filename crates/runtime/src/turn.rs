//! Turn orchestrator — runs the reconciliation pipeline, streams the
//! model's response, and merges both into a single outbound event stream.
//!
//! Entry point: [`run_turn`] spawns the async loop and returns a channel
//! of [`TurnEvent`]s. Each loop iteration is one pass: reconcile pending
//! tool work, emit the resolved results, then hand the rewritten
//! transcript to the model. Tool results always reach the consumer before
//! the model tokens that depend on them.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use ga_domain::config::{Config, ConfirmationConfig};
use ga_domain::error::Result;
use ga_domain::stream::{StreamEvent, Usage};
use ga_domain::tool::ToolCall;
use ga_domain::transcript::{Message, ToolInvocation};
use ga_providers::{ChatRequest, LlmProvider};
use ga_tools::{ExecutionContext, ToolRegistry};

use crate::pending::pending_confirmations;
use crate::reconcile::reconcile_pass;
use crate::runner::ExecutionLedger;

/// Maximum number of model/tool loops per turn before we force-stop.
const MAX_TOOL_LOOPS: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent — the outbound event type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted during a single assistant turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// A tool invocation resolved during this turn.
    #[serde(rename = "tool_result")]
    ToolResult {
        call_id: String,
        tool_name: String,
        content: Value,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },

    /// Incremental text from the assistant.
    #[serde(rename = "assistant_delta")]
    AssistantDelta { text: String },

    /// The model proposed a new tool call.
    #[serde(rename = "tool_call")]
    ToolCallEvent {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },

    /// Token usage for the turn.
    #[serde(rename = "usage")]
    UsageEvent {
        input_tokens: u32,
        output_tokens: u32,
        total_tokens: u32,
    },

    /// The turn finished. Carries the new transcript value and the call
    /// ids still awaiting confirmation (while non-empty, the consumer
    /// must keep user input disabled).
    #[serde(rename = "completed")]
    Completed {
        transcript: Vec<Message>,
        pending: Vec<String>,
    },

    /// A turn-level error. Per-tool failures never surface here; they are
    /// delivered as `tool_result` events with `is_error`.
    #[serde(rename = "error")]
    Error { message: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dependencies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a turn needs: the read-only registry, the model provider,
/// the ambient execution context, and the confirmation policy.
pub struct TurnDeps {
    pub registry: Arc<ToolRegistry>,
    pub provider: Arc<dyn LlmProvider>,
    pub context: ExecutionContext,
    pub confirmation: ConfirmationConfig,
    pub temperature: Option<f32>,
    ledger: ExecutionLedger,
}

impl TurnDeps {
    pub fn new(
        registry: Arc<ToolRegistry>,
        provider: Arc<dyn LlmProvider>,
        context: ExecutionContext,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            provider,
            context,
            confirmation: config.confirmation.clone(),
            temperature: Some(config.llm.temperature),
            ledger: ExecutionLedger::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn — the core orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one assistant turn over `transcript`.
///
/// Returns a channel receiver of [`TurnEvent`]s; the caller reads events
/// as they arrive for streaming, or drains them for non-streaming. The
/// final event is always `Completed` or `Error`.
pub fn run_turn(deps: Arc<TurnDeps>, transcript: Vec<Message>) -> mpsc::Receiver<TurnEvent> {
    let (tx, rx) = mpsc::channel::<TurnEvent>(64);

    tokio::spawn(async move {
        if let Err(e) = run_turn_inner(deps, transcript, tx.clone()).await {
            tracing::warn!(error = %e, "turn failed");
            let _ = tx
                .send(TurnEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    });

    rx
}

async fn run_turn_inner(
    deps: Arc<TurnDeps>,
    mut transcript: Vec<Message>,
    tx: mpsc::Sender<TurnEvent>,
) -> Result<()> {
    let tool_defs = deps.registry.definitions();
    let mut total_usage = Usage {
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
    };

    for loop_idx in 0..MAX_TOOL_LOOPS {
        tracing::debug!(loop_idx, "turn loop iteration");

        // ── Reconcile: scan → resolve → execute → rewrite ────────────
        let pass = reconcile_pass(
            &transcript,
            &deps.registry,
            &deps.context,
            &deps.confirmation,
            &deps.ledger,
        )
        .await?;

        for anomaly in &pass.anomalies {
            tracing::warn!(
                call_id = %anomaly.call_id,
                tool = %anomaly.tool_name,
                reason = ?anomaly.reason,
                "invocation skipped"
            );
        }

        // Resolved results go out before any model tokens of this
        // iteration, so consumers never see text that depends on a result
        // they have not received.
        for resolved in &pass.resolved {
            let _ = tx
                .send(TurnEvent::ToolResult {
                    call_id: resolved.call_id.clone(),
                    tool_name: resolved.tool_name.clone(),
                    content: resolved.outcome.content.clone(),
                    is_error: resolved.outcome.is_error,
                })
                .await;
        }

        transcript = pass.transcript;

        // ── Stream the model over the rewritten transcript ───────────
        let req = ChatRequest {
            messages: transcript.clone(),
            tools: tool_defs.clone(),
            temperature: deps.temperature,
            max_tokens: None,
            model: None,
        };
        let mut stream = deps.provider.chat_stream(&req).await?;

        let mut text_buf = String::new();
        let mut proposed: Vec<ToolCall> = Vec::new();
        let mut turn_usage: Option<Usage> = None;

        // Tool call assembly state: call_id -> (name, args_json).
        let mut tc_bufs: HashMap<String, (String, String)> = HashMap::new();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Token { text } => {
                    let _ = tx
                        .send(TurnEvent::AssistantDelta { text: text.clone() })
                        .await;
                    text_buf.push_str(&text);
                }
                StreamEvent::ToolCallStarted { call_id, tool_name } => {
                    tc_bufs.insert(call_id, (tool_name, String::new()));
                }
                StreamEvent::ToolCallDelta { call_id, delta } => {
                    if let Some((_, args)) = tc_bufs.get_mut(&call_id) {
                        args.push_str(&delta);
                    }
                }
                StreamEvent::ToolCallFinished {
                    call_id,
                    tool_name,
                    arguments,
                } => {
                    tc_bufs.remove(&call_id);
                    proposed.push(ToolCall {
                        call_id,
                        tool_name,
                        arguments,
                    });
                }
                StreamEvent::Done { usage, .. } => {
                    turn_usage = usage;
                }
                StreamEvent::Error { message } => {
                    let _ = tx.send(TurnEvent::Error { message }).await;
                    return Ok(());
                }
            }
        }

        // Some providers only send start+delta; assemble the leftovers.
        for (call_id, (tool_name, args_str)) in tc_bufs.drain() {
            let arguments = if args_str.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&args_str).unwrap_or_else(|e| {
                    tracing::warn!(
                        call_id = %call_id,
                        tool = %tool_name,
                        error = %e,
                        "tool call arguments are not valid JSON; defaulting to empty object"
                    );
                    Value::Object(Default::default())
                })
            };
            proposed.push(ToolCall {
                call_id,
                tool_name,
                arguments,
            });
        }

        if let Some(u) = &turn_usage {
            total_usage.prompt_tokens += u.prompt_tokens;
            total_usage.completion_tokens += u.completion_tokens;
            total_usage.total_tokens += u.total_tokens;
        }

        // ── No new tool calls: the turn is done ──────────────────────
        if proposed.is_empty() {
            if !text_buf.is_empty() {
                transcript.push(Message::assistant(text_buf));
            }
            return complete(&deps, &tx, transcript, total_usage).await;
        }

        // ── Append the proposals and decide whether to keep looping ──
        for tc in &proposed {
            let _ = tx
                .send(TurnEvent::ToolCallEvent {
                    call_id: tc.call_id.clone(),
                    tool_name: tc.tool_name.clone(),
                    arguments: tc.arguments.clone(),
                })
                .await;
        }

        let any_auto = proposed.iter().any(|tc| {
            deps.registry.get(&tc.tool_name).is_some()
                && !deps.registry.requires_confirmation(&tc.tool_name)
        });

        let invocations: Vec<ToolInvocation> = proposed
            .into_iter()
            .map(|tc| ToolInvocation::call(tc.tool_name, tc.call_id, tc.arguments))
            .collect();
        transcript.push(Message::assistant_with_calls(
            (!text_buf.is_empty()).then_some(text_buf),
            invocations,
        ));

        // Every new call is gated (or unknown): another pass cannot make
        // progress until a human decides, so the turn ends here with the
        // input gate raised.
        if !any_auto {
            return complete(&deps, &tx, transcript, total_usage).await;
        }

        if loop_idx == MAX_TOOL_LOOPS - 1 {
            let _ = tx
                .send(TurnEvent::Error {
                    message: format!("tool loop limit reached ({MAX_TOOL_LOOPS} iterations)"),
                })
                .await;
        }
    }

    Ok(())
}

async fn complete(
    deps: &TurnDeps,
    tx: &mpsc::Sender<TurnEvent>,
    transcript: Vec<Message>,
    total_usage: Usage,
) -> Result<()> {
    if total_usage.total_tokens > 0 {
        let _ = tx
            .send(TurnEvent::UsageEvent {
                input_tokens: total_usage.prompt_tokens,
                output_tokens: total_usage.completion_tokens,
                total_tokens: total_usage.total_tokens,
            })
            .await;
    }

    let pending = pending_confirmations(&transcript, &deps.registry);
    let _ = tx
        .send(TurnEvent::Completed {
            transcript,
            pending,
        })
        .await;
    Ok(())
}
