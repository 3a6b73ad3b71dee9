use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// An incoming message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel-specific message ID.
    pub id: String,
    /// Channel identifier (e.g., "telegram").
    pub channel: String,
    /// Sender user id.
    pub sender: String,
    /// Sender username, when the platform exposes one.
    pub sender_username: Option<String>,
    /// Display name of the sender.
    pub sender_name: Option<String>,
    /// Conversation the message arrived in; replies go here.
    pub chat_id: String,
    /// Text content (falls back to a media caption).
    pub text: Option<String>,
}

/// An outgoing message to send via a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target chat ID.
    pub target: String,
    /// Text content (may contain markdown).
    pub text: String,
}

/// Events emitted by a channel adapter.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A new message arrived.
    Message(IncomingMessage),
    /// The channel connected successfully.
    Connected,
    /// The channel disconnected.
    Disconnected(Option<String>),
}

/// Trait implemented by each channel adapter.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique identifier for this channel instance.
    fn id(&self) -> &str;

    /// Channel type name (e.g., "telegram").
    fn channel_type(&self) -> &str;

    /// Start the channel adapter. Returns a receiver for incoming events.
    async fn start(&self) -> miniclaw_core::Result<mpsc::Receiver<ChannelEvent>>;

    /// Send a message through this channel.
    async fn send(&self, message: OutgoingMessage) -> miniclaw_core::Result<()>;

    /// Send a typing indicator.
    async fn send_typing(&self, target: &str) -> miniclaw_core::Result<()>;

    /// Stop the channel adapter gracefully.
    async fn stop(&self) -> miniclaw_core::Result<()>;
}
