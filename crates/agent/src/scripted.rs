use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::driver::{AgentDriver, AgentIntent, AgentTurn, FinalRequest};
use crate::tools::ToolCall;

/// One recorded provider response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    ToolCall {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    Final {
        content: Value,
    },
}

/// Replays a fixed sequence of provider responses. Used for deterministic evaluation runs.
#[derive(Clone, Debug, Default)]
pub struct ScriptedAgent {
    steps: VecDeque<ScriptStep>,
    transcript: Vec<Value>,
}

impl ScriptedAgent {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self { steps: steps.into_iter().collect(), transcript: Vec::new() }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let steps: Vec<ScriptStep> = serde_json::from_str(raw).context("invalid agent script")?;
        Ok(Self::new(steps))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read agent script `{}`", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("in `{}`", path.display()))
    }

    /// Tool-result messages the agent received, in order.
    pub fn transcript(&self) -> &[Value] {
        &self.transcript
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

fn exhausted() -> Value {
    json!({"status": "script_exhausted"})
}

#[async_trait]
impl AgentDriver for ScriptedAgent {
    async fn next_intent(&mut self, turn: &AgentTurn) -> Result<AgentIntent> {
        if let Some(feedback) = &turn.feedback {
            self.transcript.push(feedback.to_tool_message(&turn.budget));
        }

        let Some(step) = self.steps.pop_front() else {
            debug!(event_name = "agent.script.exhausted", turn = turn.turn, "script has no steps left");
            return Ok(AgentIntent::Final { answer: exhausted() });
        };

        match step {
            ScriptStep::ToolCall { id, name, arguments } => {
                Ok(ToolCall { id, name, arguments }.into_intent()?)
            }
            ScriptStep::Final { content } => Ok(AgentIntent::Final { answer: content }),
        }
    }

    /// Skips any remaining tool calls and answers with the script's next final step.
    async fn force_final(&mut self, request: &FinalRequest) -> Result<Value> {
        debug!(
            event_name = "agent.script.force_final",
            reason = %request.reason,
            skipped = self.steps.len(),
            "forced final answer requested"
        );
        while let Some(step) = self.steps.pop_front() {
            if let ScriptStep::Final { content } = step {
                return Ok(content);
            }
        }
        Ok(exhausted())
    }
}
