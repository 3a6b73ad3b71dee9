use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of a tool that can be called by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Unique name, e.g. "read_file", "exec", "cron_add".
    pub name: String,
    /// Human-readable description for the LLM.
    pub description: String,
    /// JSON Schema of the input object.
    pub parameters: Value,
}

/// A request from the LLM to call a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// Per-invocation routing state handed to every tool call.
///
/// Built fresh for each agent invocation, so concurrent invocations never
/// observe each other's recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolContext {
    /// Session the invocation belongs to.
    pub session_key: String,
    /// Where replies for this invocation are delivered (e.g. a Telegram chat id).
    pub recipient: Option<String>,
}

impl ToolContext {
    pub fn new(session_key: impl Into<String>, recipient: Option<String>) -> Self {
        Self {
            session_key: session_key.into(),
            recipient: recipient.filter(|r| !r.is_empty()),
        }
    }
}

/// A capability the model may request: a schema plus an executor.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// The schema advertised to the model.
    fn definition(&self) -> Tool;

    /// Run the tool with already-validated input and return its text result.
    async fn execute(&self, ctx: &ToolContext, input: Value) -> crate::Result<String>;
}
