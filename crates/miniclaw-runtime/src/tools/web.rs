use async_trait::async_trait;
use miniclaw_core::{AgentTool, MiniclawError, Result, Tool, ToolContext};
use serde_json::{Value, json};
use std::time::Duration;

use super::str_arg;

const MAX_BODY_BYTES: usize = 512 * 1024;
const USER_AGENT: &str = "miniclaw/1.0 (+https://github.com/yosebyte/miniclaw)";

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTool for WebFetchTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "web_fetch".into(),
            description: "Fetch the content of a URL and return the response body (plain text). \
                          Useful for reading documentation, web pages, or API responses."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "URL to fetch."}
                },
                "required": ["url"]
            }),
        }
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<String> {
        let url = str_arg(&input, "url");
        if url.is_empty() {
            return Err(MiniclawError::tool("web_fetch", "url is required"));
        }

        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MiniclawError::tool("web_fetch", e))?;
        let status = resp.status().as_u16();

        let mut body: Vec<u8> = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| MiniclawError::tool("web_fetch", e))?
        {
            let room = MAX_BODY_BYTES - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let mut result = format!("HTTP {status}\n\n{}", String::from_utf8_lossy(&body));
        if truncated {
            result.push_str("\n[response truncated at 512 KB]");
        }
        Ok(result)
    }
}
