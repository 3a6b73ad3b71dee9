//! Periodic check-in driven by the workspace HEARTBEAT.md.

use miniclaw_core::{MessageSender, MiniclawError};
use miniclaw_memory::MemoryStore;
use miniclaw_memory::workspace::HEARTBEAT_FILE;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::agent_loop::AgentInvoker;

/// Reply meaning "nothing to report".
pub const HEARTBEAT_OK: &str = "HEARTBEAT_OK";
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const ERROR_NOTICE_PREFIX: &str = "⚠️ Heartbeat error: ";

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No instructions; the agent was not invoked.
    Skipped,
    /// The agent replied with the sentinel or nothing.
    NothingToReport,
    /// The agent produced a reply; `delivered` is false without a chat id or
    /// when sending failed.
    Replied { reply: String, delivered: bool },
    Failed(String),
}

pub struct Heartbeat {
    invoker: Arc<dyn AgentInvoker>,
    sender: Option<Arc<dyn MessageSender>>,
    workspace: MemoryStore,
    interval: Duration,
    chat_id: Option<String>,
    timeout: Duration,
}

impl Heartbeat {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        sender: Option<Arc<dyn MessageSender>>,
        workspace: MemoryStore,
        interval: Duration,
        chat_id: Option<String>,
    ) -> Self {
        Self {
            invoker,
            sender,
            workspace,
            interval: if interval.is_zero() {
                Duration::from_secs(30 * 60)
            } else {
                interval
            },
            chat_id: chat_id.filter(|c| !c.is_empty()),
            timeout: HEARTBEAT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `telegram_<chat_id>` when a chat is configured, so the check-in shares
    /// that conversation; `heartbeat:main` otherwise.
    pub fn session_key(&self) -> String {
        match &self.chat_id {
            Some(chat) => format!("telegram_{chat}"),
            None => "heartbeat:main".into(),
        }
    }

    /// Tick every interval until cancelled. The first tick comes one
    /// interval after start.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "heartbeat service started");
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("heartbeat service stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let outcome = self.tick().await;
                    debug!(?outcome, "heartbeat tick");
                }
            }
        }
    }

    pub async fn tick(&self) -> TickOutcome {
        let raw = self.workspace.read_doc(HEARTBEAT_FILE).unwrap_or_default();
        let instructions = strip_instructions(&raw);
        if instructions.is_empty() {
            debug!("heartbeat: HEARTBEAT.md empty, skipping");
            return TickOutcome::Skipped;
        }
        info!(content_len = instructions.len(), "heartbeat firing");

        let key = self.session_key();
        let result = tokio::time::timeout(
            self.timeout,
            self.invoker
                .invoke(&key, self.chat_id.as_deref(), &instructions),
        )
        .await
        .unwrap_or_else(|_| {
            Err(MiniclawError::Timeout(format!(
                "heartbeat exceeded {}s",
                self.timeout.as_secs()
            )))
        });

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "heartbeat agent error");
                self.deliver(&format!("{ERROR_NOTICE_PREFIX}{e}")).await;
                return TickOutcome::Failed(e.to_string());
            }
        };
        if is_heartbeat_ok(&reply) {
            debug!("heartbeat: nothing to report");
            return TickOutcome::NothingToReport;
        }
        let delivered = self.deliver(&reply).await;
        TickOutcome::Replied { reply, delivered }
    }

    async fn deliver(&self, text: &str) -> bool {
        let (Some(sender), Some(chat)) = (&self.sender, &self.chat_id) else {
            return false;
        };
        match sender.send_text(chat, text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "heartbeat send error");
                false
            }
        }
    }
}

/// Drop blank lines, `#` lines and single-line `<!-- -->` comments.
pub fn strip_instructions(raw: &str) -> String {
    raw.lines()
        .filter(|line| {
            let t = line.trim();
            !t.is_empty()
                && !t.starts_with('#')
                && !(t.starts_with("<!--") && t.ends_with("-->"))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Empty replies and the sentinel (any case, any surrounding whitespace).
pub fn is_heartbeat_ok(reply: &str) -> bool {
    let reply = reply.trim();
    reply.is_empty() || reply.eq_ignore_ascii_case(HEARTBEAT_OK)
}
