use async_trait::async_trait;
use miniclaw_core::{MessageSender, MiniclawError};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::adapter::*;
use crate::format::{MAX_MESSAGE_CHARS, markdown_to_html, split_message};

fn channel_error(reason: impl Into<String>) -> MiniclawError {
    MiniclawError::Channel {
        channel: "telegram".into(),
        reason: reason.into(),
    }
}

/// Telegram channel adapter using the Bot API.
pub struct TelegramChannel {
    id: String,
    api_base: String,
    client: reqwest::Client,
    shutdown_tx: Mutex<Option<tokio::sync::watch::Sender<bool>>>,
}

impl TelegramChannel {
    pub fn new(token: &str) -> Self {
        // Long polls wait up to 30s server-side, so the request timeout
        // must be larger.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(45))
            .pool_idle_timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            id: "telegram".into(),
            api_base: format!("https://api.telegram.org/bot{token}"),
            client,
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Point the adapter at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn call(&self, method: &str, body: &Value) -> miniclaw_core::Result<Value> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| channel_error(format!("{method} failed: {e}")))?;
        let status = resp.status();
        let data: Value = resp.json().await.unwrap_or_default();
        if !status.is_success() || data["ok"].as_bool() != Some(true) {
            let desc = data["description"].as_str().unwrap_or("unknown error");
            return Err(channel_error(format!("{method} failed: HTTP {status}: {desc}")));
        }
        Ok(data["result"].clone())
    }

    /// Verify the token and return the bot's username.
    pub async fn get_me(&self) -> miniclaw_core::Result<String> {
        let me = self.call("getMe", &json!({})).await?;
        Ok(me["username"].as_str().unwrap_or_default().to_string())
    }

    /// Register the command menu shown by Telegram clients.
    pub async fn set_commands(&self, commands: &[(&str, &str)]) -> miniclaw_core::Result<()> {
        let commands: Vec<Value> = commands
            .iter()
            .map(|(command, description)| json!({"command": command, "description": description}))
            .collect();
        self.call("setMyCommands", &json!({ "commands": commands }))
            .await
            .map(|_| ())
    }

    /// Send one chunk as HTML, retrying once as plain text if Telegram
    /// rejects the markup.
    async fn send_chunk(&self, chat_id: &str, chunk: &str) -> miniclaw_core::Result<()> {
        let html = json!({
            "chat_id": chat_id,
            "text": markdown_to_html(chunk),
            "parse_mode": "HTML",
        });
        match self.call("sendMessage", &html).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "HTML send failed, falling back to plain text");
                let plain = json!({ "chat_id": chat_id, "text": chunk });
                self.call("sendMessage", &plain).await.map(|_| ())
            }
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> miniclaw_core::Result<mpsc::Receiver<ChannelEvent>> {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let client = self.client.clone();
        let base_url = self.api_base.clone();

        // Spawn long-polling loop
        tokio::spawn(async move {
            let mut offset: i64 = 0;
            info!("Telegram channel connected, starting long-poll");
            let _ = event_tx.send(ChannelEvent::Connected).await;

            let mut shutdown_rx = shutdown_rx;

            // Backoff state grows on consecutive failures and resets on success
            let mut consecutive_failures: u32 = 0;
            let mut consecutive_conflicts: u32 = 0;
            const MAX_BACKOFF_SECS: u64 = 60;
            const MAX_CONFLICT_RETRIES: u32 = 5;

            let reason = loop {
                if *shutdown_rx.borrow() {
                    break None;
                }
                if event_tx.is_closed() {
                    info!("Telegram poll loop: event receiver dropped, stopping");
                    break None;
                }

                let url = format!(
                    "{base_url}/getUpdates?offset={offset}&timeout=30&allowed_updates=%5B%22message%22%5D"
                );

                tokio::select! {
                    biased; // prefer shutdown signal

                    _ = shutdown_rx.changed() => {
                        info!("Telegram poll loop: shutdown signal received");
                        break None;
                    }

                    result = client.get(&url).send() => {
                        let resp = match result {
                            Ok(resp) => resp,
                            Err(e) if e.is_timeout() => {
                                // No updates within the poll window
                                debug!("Telegram long-poll timed out (normal, no updates)");
                                continue;
                            }
                            Err(e) => {
                                warn!(error = %e, "Telegram poll network error");
                                consecutive_failures += 1;
                                tokio::time::sleep(backoff_duration(consecutive_failures, MAX_BACKOFF_SECS)).await;
                                continue;
                            }
                        };

                        let status = resp.status();
                        let data = match resp.json::<Value>().await {
                            Ok(data) => data,
                            Err(e) => {
                                warn!(status = %status, error = %e, "Telegram poll: failed to parse JSON response");
                                consecutive_failures += 1;
                                tokio::time::sleep(backoff_duration(consecutive_failures, MAX_BACKOFF_SECS)).await;
                                continue;
                            }
                        };

                        if data["ok"].as_bool() != Some(true) {
                            let desc = data["description"].as_str().unwrap_or("unknown error");
                            let code = data["error_code"].as_i64().unwrap_or(status.as_u16() as i64);

                            // 409 = another bot instance is polling with the same token
                            if code == 409 {
                                consecutive_conflicts += 1;
                                error!(
                                    attempt = consecutive_conflicts,
                                    max = MAX_CONFLICT_RETRIES,
                                    description = %desc,
                                    "Telegram 409 Conflict: another bot instance is polling with the same token"
                                );
                                if consecutive_conflicts >= MAX_CONFLICT_RETRIES {
                                    break Some("another instance owns this bot token".to_string());
                                }
                                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                                continue;
                            }

                            warn!(error_code = code, description = %desc, "Telegram API error response");
                            consecutive_failures += 1;
                            consecutive_conflicts = 0;

                            if code == 429 {
                                let retry_after = data["parameters"]["retry_after"].as_u64().unwrap_or(5);
                                warn!(retry_after, "Telegram rate limited, backing off");
                                tokio::time::sleep(std::time::Duration::from_secs(retry_after)).await;
                            } else {
                                tokio::time::sleep(backoff_duration(consecutive_failures, MAX_BACKOFF_SECS)).await;
                            }
                            continue;
                        }

                        if consecutive_failures > 0 || consecutive_conflicts > 0 {
                            info!(
                                prev_failures = consecutive_failures,
                                prev_conflicts = consecutive_conflicts,
                                "Telegram poll recovered"
                            );
                        }
                        consecutive_failures = 0;
                        consecutive_conflicts = 0;

                        for update in data["result"].as_array().into_iter().flatten() {
                            if let Some(uid) = update["update_id"].as_i64() {
                                offset = uid + 1;
                            }
                            let Some(incoming) = parse_update(update) else {
                                debug!("skipping unrecognized Telegram update");
                                continue;
                            };
                            if event_tx.send(ChannelEvent::Message(incoming)).await.is_err() {
                                info!("Telegram poll loop: event receiver dropped during dispatch");
                                return;
                            }
                        }
                    }
                }
            };

            if let Some(ref r) = reason {
                error!(reason = %r, "stopping Telegram polling");
            }
            let _ = event_tx.send(ChannelEvent::Disconnected(reason)).await;
            info!("Telegram channel disconnected");
        });

        Ok(event_rx)
    }

    async fn send(&self, message: OutgoingMessage) -> miniclaw_core::Result<()> {
        debug!(text_len = message.text.len(), target = %message.target, "Telegram send() called");
        for chunk in split_message(&message.text, MAX_MESSAGE_CHARS) {
            if chunk.is_empty() {
                continue;
            }
            self.send_chunk(&message.target, &chunk).await?;
        }
        Ok(())
    }

    async fn send_typing(&self, target: &str) -> miniclaw_core::Result<()> {
        let body = json!({
            "chat_id": target,
            "action": "typing",
        });
        if let Err(e) = self.call("sendChatAction", &body).await {
            debug!(error = %e, "typing action failed");
        }
        Ok(())
    }

    async fn stop(&self) -> miniclaw_core::Result<()> {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for TelegramChannel {
    async fn send_text(&self, recipient: &str, text: &str) -> miniclaw_core::Result<()> {
        self.send(OutgoingMessage {
            target: recipient.to_string(),
            text: text.to_string(),
        })
        .await
    }
}

/// Exponential backoff with jitter: 1s, 2s, 4s, 8s, … capped at `max_secs`.
fn backoff_duration(consecutive_failures: u32, max_secs: u64) -> std::time::Duration {
    let base = 1u64
        .checked_shl(consecutive_failures.min(6))
        .unwrap_or(max_secs);
    let capped = base.min(max_secs);
    // ±25% jitter
    let jitter_ms = (rand::random::<u64>() % (capped * 500 + 1)) as i64 - (capped as i64 * 250);
    let ms = (capped as i64 * 1000 + jitter_ms).max(500) as u64;
    std::time::Duration::from_millis(ms)
}

/// Turn one `getUpdates` entry into an incoming message. Text falls back to
/// the caption; updates without a sender or any text are skipped.
pub(crate) fn parse_update(update: &Value) -> Option<IncomingMessage> {
    let msg = update.get("message")?;
    let from = msg.get("from")?;
    let sender = from["id"].as_i64()?.to_string();
    let chat_id = msg["chat"]["id"].as_i64()?.to_string();
    let text = msg["text"]
        .as_str()
        .filter(|t| !t.is_empty())
        .or_else(|| msg["caption"].as_str().filter(|c| !c.is_empty()))?;

    Some(IncomingMessage {
        id: msg["message_id"].to_string(),
        channel: "telegram".into(),
        sender,
        sender_username: from["username"].as_str().map(String::from),
        sender_name: from["first_name"].as_str().map(String::from),
        chat_id,
        text: Some(text.to_string()),
    })
}
