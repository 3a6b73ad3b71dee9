//! # Memory Consolidator
//!
//! Folds aging session turns into HISTORY.md and MEMORY.md, using the chat
//! backend as the summarizer. Consolidation is best effort: a backend error
//! or a malformed reply is logged and the watermark stays where it was, so
//! the next trigger retries the same range.

use chrono::Local;
use miniclaw_core::{Message, MessageContent, Role};
use miniclaw_llm::{LlmProvider, LlmRequest};
use miniclaw_memory::{MemoryStore, Session, SessionMessage};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are a memory consolidation agent. Respond only with valid JSON.";

#[derive(Debug, Default, Deserialize)]
struct ConsolidationReply {
    #[serde(default)]
    history_entry: String,
    #[serde(default)]
    memory_update: String,
}

pub struct MemoryConsolidator {
    provider: Arc<dyn LlmProvider>,
    memory: MemoryStore,
    model: String,
    max_tokens: u32,
}

impl MemoryConsolidator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        memory: MemoryStore,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            memory,
            model: model.into(),
            max_tokens,
        }
    }

    /// Consolidate everything between the session's watermark and the last
    /// `keep` messages.
    ///
    /// Returns the new watermark on success and `None` when there was
    /// nothing to do or the attempt failed. The caller persists the
    /// watermark; this only touches the workspace documents.
    pub async fn consolidate(&self, session: &Session, keep: usize) -> Option<usize> {
        let end = session.messages.len().saturating_sub(keep);
        if end <= session.last_consolidated {
            debug!(session = %session.key, "nothing to consolidate");
            return None;
        }
        let pending = &session.messages[session.last_consolidated..end];
        let current_memory = self.memory.read_memory();
        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![Message::text(
                Role::User,
                build_prompt(&current_memory, pending),
            )],
            tools: vec![],
            system: Some(SYSTEM_PROMPT.into()),
            max_tokens: self.max_tokens,
        };

        let response = match self.provider.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(session = %session.key, error = %e, "memory consolidation failed");
                return None;
            }
        };
        let text = response
            .message
            .content
            .iter()
            .find_map(|c| match c {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or_default();

        let reply = match parse_reply(text) {
            Ok(reply) => reply,
            Err(e) => {
                let preview: String = text.chars().take(200).collect();
                warn!(session = %session.key, error = %e, text = %preview, "invalid consolidation reply");
                return None;
            }
        };

        if !reply.history_entry.trim().is_empty() {
            if let Err(e) = self.memory.append_history(reply.history_entry.trim()) {
                warn!(error = %e, "failed to append history entry");
            }
        }
        if !reply.memory_update.trim().is_empty() && reply.memory_update != current_memory {
            if let Err(e) = self.memory.write_memory(&reply.memory_update) {
                warn!(error = %e, "failed to write long-term memory");
            }
        }

        info!(
            session = %session.key,
            messages = pending.len(),
            watermark = end,
            "memory consolidated"
        );
        Some(end)
    }
}

fn build_prompt(current_memory: &str, messages: &[SessionMessage]) -> String {
    let conversation = messages
        .iter()
        .map(render_line)
        .collect::<Vec<_>>()
        .join("\n");
    let memory = if current_memory.trim().is_empty() {
        "(empty)"
    } else {
        current_memory
    };

    format!(
        "You are a memory consolidation agent. Process this conversation and return a JSON \
         object with exactly two keys:\n\n\
         1. \"history_entry\": A paragraph (2-5 sentences) summarizing the key \
         events/decisions/topics. Start with a timestamp like [{now}].\n\n\
         2. \"memory_update\": The updated long-term memory content. Add any new facts: user \
         preferences, personal info, project context, technical decisions. If nothing new, \
         return the existing content unchanged.\n\n\
         ## Current Long-term Memory\n{memory}\n\n\
         ## Conversation to Process\n{conversation}\n\n\
         Respond with ONLY valid JSON, no markdown fences.",
        now = Local::now().format("%Y-%m-%d %H:%M"),
    )
}

/// `[YYYY-MM-DD HH:MM] ROLE [tools: a, b]: content`
fn render_line(msg: &SessionMessage) -> String {
    let role = match msg.role {
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
        Role::Tool => "TOOL",
    };
    let tools = if msg.tools_used.is_empty() {
        String::new()
    } else {
        format!(" [tools: {}]", msg.tools_used.join(", "))
    };
    format!(
        "[{}] {role}{tools}: {}",
        msg.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        msg.content
    )
}

/// Parse the backend reply, tolerating a surrounding code fence.
fn parse_reply(text: &str) -> serde_json::Result<ConsolidationReply> {
    let mut body = text.trim();
    if body.starts_with("```") {
        body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        body = body.trim_end().trim_end_matches("```").trim();
    }
    serde_json::from_str(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_plain_and_fenced() {
        let plain = r#"{"history_entry": "h", "memory_update": "m"}"#;
        let reply = parse_reply(plain).unwrap();
        assert_eq!(reply.history_entry, "h");
        assert_eq!(reply.memory_update, "m");

        let fenced = format!("```json\n{plain}\n```");
        assert_eq!(parse_reply(&fenced).unwrap().memory_update, "m");
        let bare_fence = format!("```\n{plain}```");
        assert_eq!(parse_reply(&bare_fence).unwrap().history_entry, "h");
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_reply("Sure! Here is the summary.").is_err());
        assert!(parse_reply("").is_err());
    }

    #[test]
    fn test_render_line_with_tools() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let msg = SessionMessage {
            role: Role::Assistant,
            content: "done".into(),
            tools_used: vec!["exec".into(), "read_file".into()],
            timestamp: ts,
        };
        let local = ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
        assert_eq!(
            render_line(&msg),
            format!("[{local}] ASSISTANT [tools: exec, read_file]: done")
        );
    }
}
