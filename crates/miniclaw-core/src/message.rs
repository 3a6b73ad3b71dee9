use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// One turn of a conversation sent to (or received from) the chat backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<MessageContent>,
    /// Tool calls requested by the assistant in this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Tool results, delivered to the backend on the user side of the exchange.
    Tool,
}

/// A single content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

impl Message {
    /// Create a simple text message.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![MessageContent::Text { text: text.into() }],
            tool_calls: vec![],
        }
    }

    /// Bundle the results of one round of tool calls into a single turn.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Tool,
            content: results
                .into_iter()
                .map(|r| MessageContent::ToolResult {
                    tool_call_id: r.tool_call_id,
                    content: r.content,
                    is_error: r.is_error,
                })
                .collect(),
            tool_calls: vec![],
        }
    }

    /// Extract all text content joined together.
    pub fn text_content(&self) -> String {
        self.texts().collect::<Vec<_>>().join("\n")
    }

    /// The last text block, if any.
    pub fn last_text(&self) -> Option<&str> {
        self.texts().last()
    }

    /// Iterate over the tool-result blocks of this message.
    pub fn results(&self) -> impl Iterator<Item = (&str, &str, bool)> {
        self.content.iter().filter_map(|c| match c {
            MessageContent::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => Some((tool_call_id.as_str(), content.as_str(), *is_error)),
            _ => None,
        })
    }

    fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|c| match c {
            MessageContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}
