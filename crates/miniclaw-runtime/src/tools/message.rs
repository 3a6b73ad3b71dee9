use async_trait::async_trait;
use miniclaw_core::{AgentTool, MessageSender, MiniclawError, Result, Tool, ToolContext};
use serde_json::{Value, json};
use std::sync::Arc;

use super::str_arg;

/// Lets the model push a message to a chat outside the normal reply.
pub struct SendMessageTool {
    sender: Arc<dyn MessageSender>,
}

impl SendMessageTool {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl AgentTool for SendMessageTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "send_message".into(),
            description: "Send a message to the user via Telegram. Use this to proactively \
                          notify the user. If chat_id is omitted, the current chat is used."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Message text to send."},
                    "chat_id": {"type": "string", "description": "Target chat ID (optional, defaults to current chat)."}
                },
                "required": ["text"]
            }),
        }
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<String> {
        let explicit = str_arg(&input, "chat_id");
        let target = if explicit.is_empty() {
            ctx.recipient.as_deref()
        } else {
            Some(explicit)
        };
        let Some(target) = target else {
            return Err(MiniclawError::tool("send_message", "no chat_id available"));
        };
        self.sender.send_text(target, str_arg(&input, "text")).await?;
        Ok("Message sent.".into())
    }
}
