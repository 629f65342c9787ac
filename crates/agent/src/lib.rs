//! Agent Runtime - budget-enforcing tool loop over the endpoint gateway
//!
//! This crate runs one agent session at a time against the catalog-validated gateway:
//! - Presents two tools to the agent (`list_endpoints`, `call_endpoint`)
//! - Enforces the per-session call and cost budget before any dispatch
//! - Records every dispatch attempt in an ordered trace
//! - Forces a best-effort final answer when a limit is reached
//!
//! # Architecture
//!
//! Each session is an explicit state machine:
//! 1. **AwaitingIntent** (`driver`) - the agent returns discover, call or final
//! 2. **BudgetCheck** (`budget`) - the candidate call's declared cost is checked up front
//! 3. **Dispatch** (`orchestrator`) - the gateway validates and sends the call
//! 4. **Terminated** (`session`) - completed, budget_exceeded, turn_limit, cancelled or agent_failed
//!
//! # Key Types
//!
//! - `Orchestrator` - Session loop (see `orchestrator` module)
//! - `AgentDriver` - Pluggable trait for LLM-backed or scripted agents
//! - `SessionBudget` - Call and cost accounting
//!
//! # Safety Principle
//!
//! The agent only ever names a catalog template and parameter values. Which endpoints exist,
//! what they cost and whether they may be called are decided by the catalog and the budget.

pub mod budget;
pub mod driver;
pub mod orchestrator;
pub mod scripted;
pub mod session;
pub mod tools;

pub use budget::{BudgetDecision, SessionBudget};
pub use driver::{AgentDriver, AgentIntent, AgentTurn, FinalRequest, ToolFeedback};
pub use orchestrator::{Orchestrator, FORCED_FINAL_INSTRUCTION};
pub use scripted::{ScriptStep, ScriptedAgent};
pub use session::{FinalAnswer, SessionOutcome, SessionSettings, SessionState, TerminationReason};
pub use tools::{tool_specs, ToolCall, ToolCallError, ToolSpec};
