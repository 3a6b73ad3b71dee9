use async_trait::async_trait;

/// Delivers text to a recipient on some outbound channel.
///
/// Callers log delivery failures; they never abort an agent invocation.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str) -> crate::Result<()>;
}
