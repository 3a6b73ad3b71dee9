//! Chat gateway: routes channel messages through the agent and replies.

use miniclaw_channels::{Channel, ChannelEvent, IncomingMessage, OutgoingMessage};
use miniclaw_core::{MiniclawError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::agent_loop::AgentInvoker;

/// Commands advertised in the bot menu.
pub const BOT_COMMANDS: &[(&str, &str)] = &[
    ("start", "Start the bot"),
    ("new", "Start a new conversation"),
    ("help", "Show available commands"),
];

const TYPING_INTERVAL: Duration = Duration::from_secs(4);
/// How long shutdown waits for in-flight replies.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const PREVIEW_CHARS: usize = 60;

pub struct Gateway {
    channel: Arc<dyn Channel>,
    agent: Arc<dyn AgentInvoker>,
    allow_from: Vec<String>,
    request_timeout: Option<Duration>,
}

impl Gateway {
    pub fn new(
        channel: Arc<dyn Channel>,
        agent: Arc<dyn AgentInvoker>,
        allow_from: Vec<String>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            channel,
            agent,
            allow_from,
            request_timeout,
        }
    }

    /// Consume channel events until `cancel` fires or the channel closes,
    /// handling each message on its own task.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let mut events = self.channel.start().await?;
        let tracker = TaskTracker::new();
        info!(channel = %self.channel.id(), "gateway started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(ChannelEvent::Message(msg)) => {
                        let this = Arc::clone(&self);
                        tracker.spawn(async move { this.handle(msg).await });
                    }
                    Some(ChannelEvent::Connected) => info!(channel = %self.channel.id(), "channel connected"),
                    Some(ChannelEvent::Disconnected(reason)) => {
                        warn!(channel = %self.channel.id(), reason = ?reason, "channel disconnected");
                    }
                    None => break,
                },
            }
        }

        tracker.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait()).await.is_err() {
            warn!(pending = tracker.len(), "gave up waiting for in-flight replies");
        }
        if let Err(e) = self.channel.stop().await {
            warn!(error = %e, "failed to stop channel");
        }
        info!("gateway stopped");
        Ok(())
    }

    /// Reply to one inbound message.
    pub async fn handle(&self, msg: IncomingMessage) {
        if !is_allowed(&self.allow_from, &msg) {
            warn!(
                sender = %msg.sender,
                username = msg.sender_username.as_deref().unwrap_or(""),
                "message from unauthorised user"
            );
            return;
        }
        let Some(text) = msg.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            return;
        };

        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        info!(from = %msg.sender, chat = %msg.chat_id, preview = %preview, "message");

        if text.trim().eq_ignore_ascii_case("/start") {
            let name = msg.sender_name.as_deref().unwrap_or("there");
            self.reply(&msg.chat_id, &greeting(name)).await;
            return;
        }

        let session_key = format!("telegram_{}", msg.chat_id);
        let typing = self.spawn_typing(msg.chat_id.clone());
        let result = self.invoke(&session_key, &msg.chat_id, text).await;
        typing.cancel();

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(session = %session_key, error = %e, "agent error");
                format!("Sorry, I encountered an error: {e}")
            }
        };
        if reply.trim().is_empty() {
            debug!(session = %session_key, "empty reply, nothing sent");
            return;
        }
        self.reply(&msg.chat_id, &reply).await;
    }

    async fn invoke(&self, session_key: &str, chat_id: &str, text: &str) -> Result<String> {
        let call = self.agent.invoke(session_key, Some(chat_id), text);
        match self.request_timeout {
            None => call.await,
            Some(deadline) => tokio::time::timeout(deadline, call).await.unwrap_or_else(|_| {
                Err(MiniclawError::Timeout(format!(
                    "no reply within {}s",
                    deadline.as_secs()
                )))
            }),
        }
    }

    /// Send "typing" right away and every few seconds until the returned
    /// token is cancelled.
    fn spawn_typing(&self, chat_id: String) -> CancellationToken {
        let token = CancellationToken::new();
        let stop = token.clone();
        let channel = Arc::clone(&self.channel);
        tokio::spawn(async move {
            loop {
                if let Err(e) = channel.send_typing(&chat_id).await {
                    debug!(error = %e, "typing action failed");
                }
                tokio::select! {
                    _ = stop.cancelled() => return,
                    _ = tokio::time::sleep(TYPING_INTERVAL) => {}
                }
            }
        });
        token
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        let outgoing = OutgoingMessage {
            target: chat_id.to_string(),
            text: text.to_string(),
        };
        if let Err(e) = self.channel.send(outgoing).await {
            error!(chat = %chat_id, error = %e, "send error");
        }
    }
}

/// An empty allow-list admits everyone; otherwise the sender's id or
/// username must be listed.
pub fn is_allowed(allow_from: &[String], msg: &IncomingMessage) -> bool {
    if allow_from.is_empty() {
        return true;
    }
    allow_from.iter().any(|allowed| {
        *allowed == msg.sender
            || msg
                .sender_username
                .as_deref()
                .is_some_and(|u| !u.is_empty() && u == allowed)
    })
}

pub fn greeting(first_name: &str) -> String {
    format!(
        "👋 Hi {first_name}! I'm miniclaw.\n\nSend me a message and I'll respond!\nType /help to see available commands."
    )
}
