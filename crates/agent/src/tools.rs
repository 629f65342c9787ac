use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use statline_gateway::CallRequest;
use thiserror::Error;

use crate::driver::AgentIntent;

pub const LIST_ENDPOINTS: &str = "list_endpoints";
pub const CALL_ENDPOINT: &str = "call_endpoint";

/// A tool definition in the shape LLM providers accept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: LIST_ENDPOINTS.to_string(),
            description: "List the permitted NHL API endpoints, optionally for one category. \
                          Free: does not use the call budget."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "category": {"type": "string", "description": "Only list endpoints in this category."}
                },
                "required": []
            }),
        },
        ToolSpec {
            name: CALL_ENDPOINT.to_string(),
            description: "Call one listed endpoint. pathTemplate must match a listed template exactly; \
                          pathParams must supply every placeholder; queryParams may only use declared names. \
                          Each dispatched call uses budget."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pathTemplate": {"type": "string"},
                    "pathParams": {"type": "object", "additionalProperties": true},
                    "queryParams": {"type": "object", "additionalProperties": true}
                },
                "required": ["pathTemplate"]
            }),
        },
    ]
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {detail}")]
    InvalidArguments { tool: String, detail: String },
}

/// A tool invocation as emitted by a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ListEndpointsArgs {
    #[serde(default)]
    category: Option<String>,
}

impl ToolCall {
    pub fn into_intent(self) -> Result<AgentIntent, ToolCallError> {
        let arguments = normalize_arguments(&self.name, self.arguments)?;
        match self.name.as_str() {
            LIST_ENDPOINTS => {
                let args: ListEndpointsArgs =
                    serde_json::from_value(arguments).map_err(|error| invalid(&self.name, error))?;
                let category = args.category.filter(|category| !category.trim().is_empty());
                Ok(AgentIntent::Discover { category, call_id: self.id })
            }
            CALL_ENDPOINT => {
                let request: CallRequest =
                    serde_json::from_value(arguments).map_err(|error| invalid(&self.name, error))?;
                Ok(AgentIntent::Call { request, call_id: self.id })
            }
            _ => Err(ToolCallError::UnknownTool(self.name)),
        }
    }
}

/// Providers send arguments as an object, as a JSON-encoded string, or not at all.
fn normalize_arguments(tool: &str, arguments: Value) -> Result<Value, ToolCallError> {
    match arguments {
        Value::Null => Ok(json!({})),
        Value::String(encoded) if encoded.trim().is_empty() => Ok(json!({})),
        Value::String(encoded) => serde_json::from_str(&encoded).map_err(|error| invalid(tool, error)),
        other => Ok(other),
    }
}

fn invalid(tool: &str, error: serde_json::Error) -> ToolCallError {
    ToolCallError::InvalidArguments { tool: tool.to_string(), detail: error.to_string() }
}
