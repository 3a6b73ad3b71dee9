use async_trait::async_trait;
use miniclaw_core::{Message, MessageContent, MiniclawError, Result, Role, ToolCall};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::provider::*;

const API_VERSION: &str = "2023-06-01";
const OAUTH_BETA: &str = "oauth-2024-09-20";
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// How requests authenticate against the Messages API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `x-api-key` header.
    ApiKey(String),
    /// OAuth access token sent as `Authorization: Bearer`.
    Bearer(String),
}

impl Credential {
    /// Pick the API key when present, otherwise the access token.
    pub fn from_parts(api_key: Option<&str>, access_token: Option<&str>) -> Option<Self> {
        match (api_key, access_token) {
            (Some(k), _) if !k.is_empty() => Some(Self::ApiKey(k.to_string())),
            (_, Some(t)) if !t.is_empty() => Some(Self::Bearer(t.to_string())),
            _ => None,
        }
    }
}

/// Anthropic Claude API provider.
pub struct AnthropicProvider {
    client: Client,
    credential: Credential,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(credential: Credential) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            credential,
            base_url: "https://api.anthropic.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Credential::ApiKey(key) => req.header("x-api-key", key),
            Credential::Bearer(token) => req
                .header("Authorization", format!("Bearer {token}"))
                .header("anthropic-beta", OAUTH_BETA),
        }
    }
}

pub(crate) fn build_request_body(request: &LlmRequest) -> Value {
    let mut messages = Vec::new();
    for msg in &request.messages {
        match msg.role {
            Role::User => {
                messages.push(json!({
                    "role": "user",
                    "content": msg.text_content(),
                }));
            }
            Role::Assistant => {
                if msg.tool_calls.is_empty() {
                    messages.push(json!({
                        "role": "assistant",
                        "content": msg.text_content(),
                    }));
                } else {
                    // Assistant message with tool_use blocks
                    let mut content_blocks: Vec<Value> = Vec::new();
                    let text = msg.text_content();
                    if !text.is_empty() {
                        content_blocks.push(json!({
                            "type": "text",
                            "text": text,
                        }));
                    }
                    for tc in &msg.tool_calls {
                        content_blocks.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.tool_name,
                            "input": tc.arguments,
                        }));
                    }
                    messages.push(json!({
                        "role": "assistant",
                        "content": content_blocks,
                    }));
                }
            }
            Role::Tool => {
                // Tool results travel as a user turn of tool_result blocks
                let content_blocks: Vec<Value> = msg
                    .results()
                    .map(|(id, content, is_error)| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": id,
                            "content": content,
                            "is_error": is_error,
                        })
                    })
                    .collect();
                if content_blocks.is_empty() {
                    messages.push(json!({
                        "role": "user",
                        "content": msg.text_content(),
                    }));
                } else {
                    messages.push(json!({
                        "role": "user",
                        "content": content_blocks,
                    }));
                }
            }
        }
    }

    let mut body = json!({
        "model": &request.model,
        "max_tokens": request.max_tokens,
        "messages": messages,
    });

    if let Some(ref system) = request.system {
        body["system"] = json!(system);
    }

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }

    body
}

pub(crate) fn parse_response(data: &Value) -> LlmResponse {
    let mut content = Vec::new();
    let mut tool_calls = Vec::new();

    for block in data["content"].as_array().into_iter().flatten() {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str() {
                    content.push(MessageContent::Text {
                        text: text.to_string(),
                    });
                }
            }
            Some("tool_use") => tool_calls.push(ToolCall {
                id: block["id"].as_str().unwrap_or_default().to_string(),
                tool_name: block["name"].as_str().unwrap_or_default().to_string(),
                arguments: block["input"].clone(),
            }),
            _ => {}
        }
    }

    let stop_reason = match data["stop_reason"].as_str() {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    };

    let usage_data = &data["usage"];
    let count = |field: &str| usage_data[field].as_u64().unwrap_or(0) as u32;
    let usage = Usage {
        input_tokens: count("input_tokens"),
        output_tokens: count("output_tokens"),
        cache_read_tokens: count("cache_read_input_tokens"),
        cache_write_tokens: count("cache_creation_input_tokens"),
    };

    let has_tool_calls = !tool_calls.is_empty();
    LlmResponse {
        message: Message {
            role: Role::Assistant,
            content,
            tool_calls,
        },
        usage,
        has_tool_calls,
        stop_reason,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = build_request_body(request);
        debug!(model = %request.model, turns = request.messages.len(), "sending Anthropic API request");

        let req = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| MiniclawError::LlmProvider(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let text = resp.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(MiniclawError::RateLimited {
                    retry_after_secs: retry_after.unwrap_or(30),
                });
            }
            return Err(MiniclawError::LlmProvider(format!("HTTP {status}: {text}")));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| MiniclawError::LlmProvider(format!("malformed response: {e}")))?;

        let response = parse_response(&data);
        debug!(
            stop_reason = ?response.stop_reason,
            tool_calls = response.message.tool_calls.len(),
            output_tokens = response.usage.output_tokens,
            "Anthropic API response"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniclaw_core::{Tool, ToolResult};

    fn request(messages: Vec<Message>) -> LlmRequest {
        LlmRequest {
            model: "claude-opus-4-5".into(),
            messages,
            tools: vec![],
            system: None,
            max_tokens: 1024,
        }
    }

    #[test]
    fn test_credential_prefers_api_key() {
        assert_eq!(
            Credential::from_parts(Some("k"), Some("t")),
            Some(Credential::ApiKey("k".into()))
        );
        assert_eq!(
            Credential::from_parts(Some(""), Some("t")),
            Some(Credential::Bearer("t".into()))
        );
        assert_eq!(Credential::from_parts(None, None), None);
    }

    #[test]
    fn test_body_carries_system_and_tools() {
        let mut req = request(vec![Message::text(Role::User, "hi")]);
        req.system = Some("be brief".into());
        req.tools = vec![Tool {
            name: "exec".into(),
            description: "run".into(),
            parameters: json!({"type": "object"}),
        }];
        let body = build_request_body(&req);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn test_body_encodes_tool_exchange() {
        let mut assistant = Message::text(Role::Assistant, "let me look");
        assistant.tool_calls = vec![ToolCall {
            id: "toolu_1".into(),
            tool_name: "list_dir".into(),
            arguments: json!({"path": "."}),
        }];
        let results = Message::tool_results(vec![ToolResult::error("toolu_1", "denied")]);
        let body = build_request_body(&request(vec![
            Message::text(Role::User, "ls"),
            assistant,
            results,
        ]));

        let blocks = &body["messages"][1]["content"];
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[1]["type"], "tool_use");
        assert_eq!(blocks[1]["name"], "list_dir");

        let turn = &body["messages"][2];
        assert_eq!(turn["role"], "user");
        assert_eq!(turn["content"][0]["type"], "tool_result");
        assert_eq!(turn["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(turn["content"][0]["is_error"], true);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_response_keeps_blocks_apart() {
        let data = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "toolu_9", "name": "exec", "input": {"command": "ls"}},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        });
        let resp = parse_response(&data);
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert!(resp.has_tool_calls);
        assert_eq!(resp.message.last_text(), Some("second"));
        assert_eq!(resp.message.tool_calls[0].id, "toolu_9");
        assert_eq!(resp.message.tool_calls[0].arguments["command"], "ls");
        assert_eq!(resp.usage.total_tokens(), 19);
    }

    #[test]
    fn test_parse_response_defaults_to_end_turn() {
        let resp = parse_response(&json!({"content": []}));
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert!(!resp.has_tool_calls);
        assert_eq!(resp.message.last_text(), None);
    }
}
