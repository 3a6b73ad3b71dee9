#[cfg(test)]
mod tests {
    use miniclaw_core::{Message, Role};
    use miniclaw_llm::*;
    use std::sync::Arc;

    fn request(text: &str) -> LlmRequest {
        LlmRequest {
            model: "claude-opus-4-5".into(),
            messages: vec![Message::text(Role::User, text)],
            tools: vec![],
            system: Some("system".into()),
            max_tokens: 256,
        }
    }

    // ── Usage ──────────────────────────────────────────────────

    #[test]
    fn test_usage_merge() {
        let mut total = Usage::default();
        total.merge(&Usage {
            input_tokens: 10,
            output_tokens: 5,
            cache_read_tokens: 2,
            cache_write_tokens: 1,
        });
        total.merge(&Usage {
            input_tokens: 1,
            output_tokens: 1,
            ..Default::default()
        });
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.output_tokens, 6);
        assert_eq!(total.cache_read_tokens, 2);
        assert_eq!(total.total_tokens(), 17);
    }

    #[test]
    fn test_stop_reason_serde() {
        let json = serde_json::to_string(&StopReason::ToolUse).unwrap();
        assert_eq!(json, "\"tool_use\"");
    }

    // ── Provider as trait object ───────────────────────────────

    #[tokio::test]
    async fn test_mock_behind_dyn_provider() {
        let mock = Arc::new(
            MockProvider::new("mock")
                .with_mock_response(MockResponse {
                    texts: vec!["thinking".into(), "answer".into()],
                    ..Default::default()
                }),
        );
        let provider: Arc<dyn LlmProvider> = mock.clone();
        assert_eq!(provider.name(), "mock");

        let resp = provider.complete(&request("question")).await.unwrap();
        assert_eq!(resp.message.last_text(), Some("answer"));

        let recorded = mock.recorded_requests();
        let recorded = recorded.lock();
        assert_eq!(recorded[0].messages[0].text_content(), "question");
    }

    #[test]
    fn test_anthropic_provider_name() {
        let provider = AnthropicProvider::new(Credential::ApiKey("sk-test".into()))
            .with_base_url("http://localhost:9/v1/");
        assert_eq!(provider.name(), "anthropic");
    }
}
