//! Mock chat backend for deterministic testing.
//!
//! Returns pre-configured responses without making any HTTP calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::provider::*;
use miniclaw_core::{Message, MessageContent, MiniclawError, Result, Role, ToolCall};

/// A mock provider that returns pre-configured responses in order.
///
/// # Example
/// ```
/// use miniclaw_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_response("Hello, world!");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Returned once the queue is drained.
    fallback: Option<MockResponse>,
    /// Every request received, for assertions in tests.
    pub requests: Arc<Mutex<Vec<LlmRequest>>>,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Clone)]
pub struct MockResponse {
    /// Text blocks, in order.
    pub texts: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
    /// If set, the provider returns this error instead.
    pub error: Option<String>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            texts: vec![],
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 100,
                output_tokens: 50,
                ..Default::default()
            },
            error: None,
        }
    }
}

impl MockResponse {
    /// A plain text response.
    pub fn text(text: &str) -> Self {
        Self {
            texts: vec![text.to_string()],
            ..Default::default()
        }
    }

    /// A response that requests one tool invocation.
    pub fn tool_call(name: &str, args: serde_json::Value) -> Self {
        Self {
            tool_calls: vec![ToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4()),
                tool_name: name.to_string(),
                arguments: args,
            }],
            stop_reason: StopReason::ToolUse,
            ..Default::default()
        }
    }

    /// An error response.
    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback: None,
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a simple text response.
    pub fn with_response(self, text: &str) -> Self {
        self.with_mock_response(MockResponse::text(text))
    }

    /// Queue a tool call response.
    pub fn with_tool_call(self, name: &str, args: serde_json::Value) -> Self {
        self.with_mock_response(MockResponse::tool_call(name, args))
    }

    /// Queue an error response.
    pub fn with_error(self, error: &str) -> Self {
        self.with_mock_response(MockResponse::error(error))
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.responses.lock().push_back(resp);
        self
    }

    /// Response repeated forever once the queue is empty.
    pub fn with_fallback(mut self, resp: MockResponse) -> Self {
        self.fallback = Some(resp);
        self
    }

    /// Get all requests that were made to this provider.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Queue a response through a shared reference.
    pub fn queue_response(&self, resp: MockResponse) {
        self.responses.lock().push_back(resp);
    }

    /// Number of requests seen so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_response(&self) -> MockResponse {
        if let Some(resp) = self.responses.lock().pop_front() {
            return resp;
        }
        self.fallback
            .clone()
            .unwrap_or_else(|| MockResponse::text("(mock: no more queued responses)"))
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        let mock = self.next_response();

        if let Some(error) = mock.error {
            return Err(MiniclawError::LlmProvider(error));
        }

        let has_tool_calls = !mock.tool_calls.is_empty();
        let message = Message {
            role: Role::Assistant,
            content: mock
                .texts
                .into_iter()
                .map(|text| MessageContent::Text { text })
                .collect(),
            tool_calls: mock.tool_calls,
        };

        Ok(LlmResponse {
            message,
            usage: mock.usage,
            has_tool_calls,
            stop_reason: mock.stop_reason,
        })
    }
}
