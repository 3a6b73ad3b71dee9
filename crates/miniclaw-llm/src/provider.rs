use async_trait::async_trait;
use miniclaw_core::{Message, Result, Tool};
use serde::{Deserialize, Serialize};

/// A request to the chat backend.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The model to use, e.g. "claude-opus-4-5".
    pub model: String,
    /// Conversation turns, oldest first.
    pub messages: Vec<Message>,
    /// Tools the model may invoke.
    pub tools: Vec<Tool>,
    /// System prompt, sent separately from the turns.
    pub system: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// A complete response from the chat backend.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub message: Message,
    pub usage: Usage,
    /// Whether the model requested tool invocations.
    pub has_tool_calls: bool,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_read_tokens: u32,
    pub cache_write_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
    }
}

/// Trait implemented by each chat backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable name, e.g. "anthropic".
    fn name(&self) -> &str;

    /// Send a request and wait for the full response.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}
