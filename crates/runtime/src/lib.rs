//! GateAgent runtime — the confirmation-gated tool pipeline.
//!
//! A turn works in passes over the transcript:
//!
//! 1. [`scanner`] finds every tool invocation part.
//! 2. [`resolver`] pairs gated invocations with human decisions and plans
//!    what to execute or settle, without side effects.
//! 3. [`runner`] carries out the plan, at most once per call id.
//! 4. [`rewriter`] splices the outcomes back into the transcript.
//!
//! [`reconcile`] composes one pass; [`turn`] loops passes against the
//! model provider and streams [`turn::TurnEvent`]s to the consumer.
//! [`pending`] derives the set of call ids still awaiting a decision,
//! which doubles as the user-input gate.

pub mod pending;
pub mod reconcile;
pub mod resolver;
pub mod rewriter;
pub mod runner;
pub mod scanner;
pub mod turn;

pub use pending::{has_pending_confirmation, pending_confirmations};
pub use reconcile::{reconcile_pass, PassOutcome};
pub use resolver::{Anomaly, AnomalyReason, PlannedAction, ResolutionPlan};
pub use runner::{ExecutionLedger, ResolvedCall};
pub use turn::{run_turn, TurnDeps, TurnEvent};
