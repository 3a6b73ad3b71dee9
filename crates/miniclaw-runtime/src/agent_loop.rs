//! # Agent Loop
//!
//! The tool-calling state machine. One call to [`AgentLoop::process_message`]
//! loads the session, lets the model answer or call tools until it produces a
//! terminal reply (or the iteration cap is hit), and persists the exchange.
//!
//! Routing state travels in a [`ToolContext`] built per invocation, so
//! concurrent invocations never share a recipient.

use async_trait::async_trait;
use chrono::Local;
use miniclaw_config::AgentConfig;
use miniclaw_core::{Message, MiniclawError, Result, Role, ToolContext, ToolResult};
use miniclaw_llm::{LlmProvider, LlmRequest, StopReason, Usage};
use miniclaw_memory::{MemoryStore, Session, SessionStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::consolidate::MemoryConsolidator;
use crate::context::build_system_prompt;
use crate::registry::ToolRegistry;

pub const NEW_SESSION_REPLY: &str = "New session started. Memory consolidation in progress.";
pub const HELP_REPLY: &str =
    "🐾 miniclaw commands:\n/new — Start a new conversation\n/help — Show available commands";
pub const FALLBACK_REPLY: &str = "I've completed processing but have no response to give.";

/// Tool inputs longer than this are cut in logs.
const LOG_INPUT_CHARS: usize = 200;

/// Anything that can run one agent turn. Triggers (cron, heartbeat, the
/// gateway) depend on this rather than on [`AgentLoop`] directly.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, session_key: &str, recipient: Option<&str>, text: &str)
    -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub memory_window: usize,
    /// Deadline for interactive invocations. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl From<&AgentConfig> for AgentSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_iterations: config.max_iterations,
            memory_window: config.memory_window,
            request_timeout: (config.request_timeout_secs > 0)
                .then(|| Duration::from_secs(config.request_timeout_secs)),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
    memory: MemoryStore,
    consolidator: Arc<MemoryConsolidator>,
    settings: AgentSettings,
    /// Session keys with a background consolidation in flight.
    consolidating: Arc<Mutex<HashSet<String>>>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        sessions: SessionStore,
        memory: MemoryStore,
        settings: AgentSettings,
    ) -> Self {
        let consolidator = Arc::new(MemoryConsolidator::new(
            Arc::clone(&provider),
            memory.clone(),
            settings.model.clone(),
            settings.max_tokens,
        ));
        Self {
            provider,
            tools: Arc::new(tools),
            sessions: Arc::new(sessions),
            memory,
            consolidator,
            settings,
            consolidating: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn is_consolidating(&self, session_key: &str) -> bool {
        self.consolidating.lock().contains(session_key)
    }

    /// Handle one inbound message and return the reply text.
    pub async fn process_message(
        &self,
        session_key: &str,
        recipient: Option<&str>,
        text: &str,
    ) -> Result<String> {
        match text.trim().to_lowercase().as_str() {
            "/new" => return Ok(self.start_new_session(session_key).await),
            "/help" => return Ok(HELP_REPLY.to_string()),
            _ => {}
        }

        let window = self.settings.memory_window;
        let session = self.sessions.load(session_key).await;
        if session.unconsolidated() > window {
            self.spawn_consolidation(session.clone());
        }

        let system = build_system_prompt(&self.memory, Local::now());
        let mut messages = session.recent_messages(window);
        messages.push(Message::text(Role::User, text));

        let ctx = ToolContext::new(session_key, recipient.map(str::to_string));
        let (reply, tools_used) = self.run_loop(&ctx, system, messages).await?;

        let saved = self
            .sessions
            .update(session_key, |s| {
                s.add(Role::User, text, vec![]);
                s.add(Role::Assistant, reply.as_str(), tools_used);
            })
            .await;
        if let Err(e) = saved {
            warn!(session = %session_key, error = %e, "failed to save session");
        }
        Ok(reply)
    }

    /// [`process_message`](Self::process_message) bounded by the configured
    /// request timeout.
    pub async fn process_interactive(
        &self,
        session_key: &str,
        recipient: Option<&str>,
        text: &str,
    ) -> Result<String> {
        let Some(deadline) = self.settings.request_timeout else {
            return self.process_message(session_key, recipient, text).await;
        };
        tokio::time::timeout(deadline, self.process_message(session_key, recipient, text))
            .await
            .unwrap_or_else(|_| {
                warn!(session = %session_key, timeout_secs = deadline.as_secs(), "request timed out");
                Err(MiniclawError::Timeout(format!(
                    "no reply within {}s",
                    deadline.as_secs()
                )))
            })
    }

    async fn run_loop(
        &self,
        ctx: &ToolContext,
        system: String,
        mut messages: Vec<Message>,
    ) -> Result<(String, Vec<String>)> {
        let tool_defs = self.tools.definitions();
        let mut tools_used: Vec<String> = Vec::new();
        let mut usage = Usage::default();

        for iteration in 0..self.settings.max_iterations {
            let request = LlmRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                system: Some(system.clone()),
                max_tokens: self.settings.max_tokens,
            };
            let response = self.provider.complete(&request).await.map_err(|e| match e {
                MiniclawError::LlmProvider(_) | MiniclawError::RateLimited { .. } => e,
                other => MiniclawError::LlmProvider(other.to_string()),
            })?;

            usage.merge(&response.usage);

            if response.stop_reason == StopReason::EndTurn || !response.has_tool_calls {
                debug!(
                    session = %ctx.session_key,
                    iteration,
                    tokens = usage.total_tokens(),
                    cache_read_tokens = usage.cache_read_tokens,
                    "terminal response"
                );
                // Blank final text is never stored as an assistant turn.
                let text = match response.message.last_text() {
                    Some(text) if !text.trim().is_empty() => text.to_string(),
                    _ => FALLBACK_REPLY.to_string(),
                };
                return Ok((text, tools_used));
            }

            let calls = response.message.tool_calls.clone();
            messages.push(response.message);

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                tools_used.push(call.tool_name.clone());
                let input: String = call.arguments.to_string();
                let preview: String = input.chars().take(LOG_INPUT_CHARS).collect();
                info!(session = %ctx.session_key, tool = %call.tool_name, input = %preview, "tool call");

                let result = match self
                    .tools
                    .execute(ctx, &call.tool_name, call.arguments)
                    .await
                {
                    Ok(output) => ToolResult::ok(call.id, output),
                    Err(e) => {
                        warn!(tool = %call.tool_name, error = %e, "tool error");
                        ToolResult::error(call.id, e.to_string())
                    }
                };
                results.push(result);
            }
            messages.push(Message::tool_results(results));
        }

        warn!(
            session = %ctx.session_key,
            max_iterations = self.settings.max_iterations,
            tokens = usage.total_tokens(),
            "max agent iterations reached"
        );
        Ok((FALLBACK_REPLY.to_string(), tools_used))
    }

    /// Clear the session and archive what it held in the background.
    async fn start_new_session(&self, session_key: &str) -> String {
        let mut discarded: Option<Session> = None;
        let cleared = self
            .sessions
            .update(session_key, |s| {
                discarded = Some(s.clone());
                s.clear();
            })
            .await;
        if let Err(e) = cleared {
            warn!(session = %session_key, error = %e, "failed to clear session");
        }

        if let Some(old) = discarded.filter(|s| s.unconsolidated() > 0) {
            let consolidator = Arc::clone(&self.consolidator);
            tokio::spawn(async move {
                consolidator.consolidate(&old, 0).await;
            });
        }
        NEW_SESSION_REPLY.to_string()
    }

    /// Launch a detached consolidation of `snapshot`, at most one per key.
    ///
    /// The watermark is only advanced if the session still holds the
    /// consolidated prefix, and never moves backwards.
    fn spawn_consolidation(&self, snapshot: Session) {
        let key = snapshot.key.clone();
        if !self.consolidating.lock().insert(key.clone()) {
            debug!(session = %key, "consolidation already running");
            return;
        }

        let consolidator = Arc::clone(&self.consolidator);
        let sessions = Arc::clone(&self.sessions);
        let in_flight = Arc::clone(&self.consolidating);
        let keep = self.settings.memory_window / 2;
        tokio::spawn(async move {
            if let Some(end) = consolidator.consolidate(&snapshot, keep).await {
                let boundary = snapshot.messages.get(end.saturating_sub(1)).cloned();
                let applied = sessions
                    .update(&key, |s| {
                        let still_there = s.messages.get(end.saturating_sub(1)) == boundary.as_ref();
                        if still_there {
                            s.advance_watermark(end);
                        }
                        still_there
                    })
                    .await;
                match applied {
                    Ok(true) => debug!(session = %key, watermark = end, "watermark advanced"),
                    Ok(false) => debug!(session = %key, "session changed underneath consolidation"),
                    Err(e) => warn!(session = %key, error = %e, "failed to save watermark"),
                }
            }
            in_flight.lock().remove(&key);
        });
    }
}

#[async_trait]
impl AgentInvoker for AgentLoop {
    async fn invoke(
        &self,
        session_key: &str,
        recipient: Option<&str>,
        text: &str,
    ) -> Result<String> {
        self.process_message(session_key, recipient, text).await
    }
}
