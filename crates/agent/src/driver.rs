use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use statline_core::{EndpointSummary, ToolFailure};
use statline_gateway::CallRequest;

use crate::budget::SessionBudget;
use crate::session::TerminationReason;

/// What the agent wants to do next.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentIntent {
    Discover { category: Option<String>, call_id: Option<String> },
    Call { request: CallRequest, call_id: Option<String> },
    Final { answer: Value },
}

/// Result of the previous intent, handed back to the agent on its next turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolFeedback {
    Endpoints { call_id: Option<String>, endpoints: Vec<EndpointSummary> },
    Payload { call_id: Option<String>, payload: Value },
    Failure { call_id: Option<String>, failure: ToolFailure },
}

impl ToolFeedback {
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::Endpoints { call_id, .. }
            | Self::Payload { call_id, .. }
            | Self::Failure { call_id, .. } => call_id.as_deref(),
        }
    }

    /// The tool-result message body an agent sees, with the budget left after the call.
    pub fn to_tool_message(&self, budget: &SessionBudget) -> Value {
        let mut message = match self {
            Self::Endpoints { endpoints, .. } => json!({ "endpoints": endpoints }),
            Self::Payload { payload, .. } => json!({ "payload": payload }),
            Self::Failure { failure, .. } => json!({
                "errorKind": failure.error_kind,
                "detail": failure.detail,
                "charged": failure.charged,
                "hint": failure.hint,
            }),
        };
        message["budget"] = json!({
            "callsRemaining": budget.calls_remaining(),
            "costRemaining": budget.cost_remaining(),
        });
        message
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentTurn {
    pub turn: u32,
    pub budget: SessionBudget,
    pub feedback: Option<ToolFeedback>,
}

/// Sent when the session stops on a limit; the agent must answer with what it has.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalRequest {
    pub reason: TerminationReason,
    pub instruction: String,
    pub budget: SessionBudget,
}

/// The agent collaborator. Implementations wrap an LLM provider or a fixed script.
#[async_trait]
pub trait AgentDriver: Send {
    async fn next_intent(&mut self, turn: &AgentTurn) -> Result<AgentIntent>;

    async fn force_final(&mut self, request: &FinalRequest) -> Result<Value>;
}
