#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use miniclaw_core::{MessageSender, MiniclawError, Result};
    use miniclaw_memory::MemoryStore;
    use miniclaw_runtime::*;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_text(&self, recipient: &str, text: &str) -> Result<()> {
            self.sent.lock().push((recipient.into(), text.into()));
            Ok(())
        }
    }

    struct FixedInvoker {
        reply: std::result::Result<String, String>,
        calls: Mutex<Vec<(String, Option<String>, String)>>,
    }

    impl FixedInvoker {
        fn new(reply: std::result::Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(String::from).map_err(String::from),
                calls: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl AgentInvoker for FixedInvoker {
        async fn invoke(
            &self,
            session_key: &str,
            recipient: Option<&str>,
            text: &str,
        ) -> Result<String> {
            self.calls.lock().push((
                session_key.into(),
                recipient.map(String::from),
                text.into(),
            ));
            self.reply.clone().map_err(MiniclawError::LlmProvider)
        }
    }

    fn write_instructions(dir: &Path, content: &str) {
        std::fs::write(dir.join("HEARTBEAT.md"), content).unwrap();
    }

    fn heartbeat(
        dir: &Path,
        invoker: &Arc<FixedInvoker>,
        sender: &Arc<RecordingSender>,
        chat_id: Option<&str>,
    ) -> Heartbeat {
        Heartbeat::new(
            invoker.clone(),
            Some(sender.clone()),
            MemoryStore::new(dir),
            Duration::from_secs(60),
            chat_id.map(String::from),
        )
    }

    // ── Skipping ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_comment_only_instructions_do_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_instructions(
            dir.path(),
            "# Heartbeat\n\n<!-- Add periodic tasks here -->\n\n## Ideas\n",
        );
        let invoker = FixedInvoker::new(Ok("report"));
        let sender = Arc::new(RecordingSender::default());
        let hb = heartbeat(dir.path(), &invoker, &sender, Some("99"));

        assert_eq!(hb.tick().await, TickOutcome::Skipped);
        assert!(invoker.calls.lock().is_empty());
        assert!(sender.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_instructions_do_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = FixedInvoker::new(Ok("report"));
        let sender = Arc::new(RecordingSender::default());
        let hb = heartbeat(dir.path(), &invoker, &sender, Some("99"));
        assert_eq!(hb.tick().await, TickOutcome::Skipped);
        assert!(invoker.calls.lock().is_empty());
    }

    // ── Replies ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_sentinel_reply_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        write_instructions(dir.path(), "# Tasks\n- check disk space\n");
        let invoker = FixedInvoker::new(Ok("  heartbeat_ok \n"));
        let sender = Arc::new(RecordingSender::default());
        let hb = heartbeat(dir.path(), &invoker, &sender, Some("99"));

        assert_eq!(hb.tick().await, TickOutcome::NothingToReport);
        assert_eq!(invoker.calls.lock().len(), 1);
        assert!(sender.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_report_is_delivered_to_chat() {
        let dir = tempfile::tempdir().unwrap();
        write_instructions(dir.path(), "# Tasks\n- check disk space\n");
        let invoker = FixedInvoker::new(Ok("Disk is 93% full."));
        let sender = Arc::new(RecordingSender::default());
        let hb = heartbeat(dir.path(), &invoker, &sender, Some("99"));

        let outcome = hb.tick().await;
        assert_eq!(
            outcome,
            TickOutcome::Replied {
                reply: "Disk is 93% full.".into(),
                delivered: true
            }
        );
        let calls = invoker.calls.lock();
        assert_eq!(calls[0].0, "telegram_99");
        assert_eq!(calls[0].1.as_deref(), Some("99"));
        assert_eq!(calls[0].2, "- check disk space");
        assert_eq!(
            sender.sent.lock().as_slice(),
            &[("99".to_string(), "Disk is 93% full.".to_string())]
        );
    }

    #[tokio::test]
    async fn test_without_chat_id_nothing_is_sent() {
        let dir = tempfile::tempdir().unwrap();
        write_instructions(dir.path(), "- summarize the news");
        let invoker = FixedInvoker::new(Ok("Here is the news."));
        let sender = Arc::new(RecordingSender::default());
        let hb = heartbeat(dir.path(), &invoker, &sender, None);

        assert_eq!(hb.session_key(), "heartbeat:main");
        let outcome = hb.tick().await;
        assert!(matches!(outcome, TickOutcome::Replied { delivered: false, .. }));
        assert_eq!(invoker.calls.lock()[0].1, None);
        assert!(sender.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_agent_failure_sends_notice() {
        let dir = tempfile::tempdir().unwrap();
        write_instructions(dir.path(), "- anything");
        let invoker = FixedInvoker::new(Err("quota exceeded"));
        let sender = Arc::new(RecordingSender::default());
        let hb = heartbeat(dir.path(), &invoker, &sender, Some("5"));

        assert!(matches!(hb.tick().await, TickOutcome::Failed(_)));
        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("quota exceeded"));
    }

    // ── Timer ──────────────────────────────────────────────────

    #[test]
    fn test_zero_interval_falls_back_to_thirty_minutes() {
        let invoker = FixedInvoker::new(Ok(""));
        let hb = Heartbeat::new(invoker, None, MemoryStore::new("/tmp"), Duration::ZERO, None);
        assert_eq!(hb.interval(), Duration::from_secs(30 * 60));
    }

    #[tokio::test]
    async fn test_run_ticks_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        write_instructions(dir.path(), "- ping");
        let invoker = FixedInvoker::new(Ok("HEARTBEAT_OK"));
        let hb = Arc::new(Heartbeat::new(
            invoker.clone(),
            None,
            MemoryStore::new(dir.path()),
            Duration::from_millis(30),
            None,
        ));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(hb.run(cancel.clone()));

        for _ in 0..100 {
            if invoker.calls.lock().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        task.await.unwrap();
        assert!(invoker.calls.lock().len() >= 2);
    }
}
