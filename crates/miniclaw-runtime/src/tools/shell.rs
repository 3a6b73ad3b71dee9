use async_trait::async_trait;
use miniclaw_config::expand_home;
use miniclaw_core::{AgentTool, MiniclawError, Result, Tool, ToolContext};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::str_arg;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs a shell command and returns interleaved stdout and stderr.
pub struct ExecTool {
    pub timeout: Duration,
}

impl Default for ExecTool {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[async_trait]
impl AgentTool for ExecTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "exec".into(),
            description: format!(
                "Execute a shell command and return combined stdout+stderr. Timeout: {} seconds.",
                self.timeout.as_secs()
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "Shell command to execute."},
                    "workdir": {"type": "string", "description": "Working directory (optional)."}
                },
                "required": ["command"]
            }),
        }
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<String> {
        let command = str_arg(&input, "command");
        let workdir = str_arg(&input, "workdir");
        debug!(command = %command, "exec");

        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !workdir.is_empty() {
            cmd.current_dir(expand_home(workdir));
        }

        let mut child = cmd.spawn().map_err(|e| MiniclawError::tool("exec", e))?;
        let output = Arc::new(Mutex::new(Vec::new()));
        let pumps = [
            child.stdout.take().map(|s| pump(s, Arc::clone(&output))),
            child.stderr.take().map(|s| pump(s, Arc::clone(&output))),
        ];

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| MiniclawError::tool("exec", e))?,
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "command timed out");
                let _ = child.kill().await;
                for pump in pumps.into_iter().flatten() {
                    pump.abort();
                }
                return Ok(format!("{}\n[command timed out]", collected(&output)));
            }
        };

        // Background children may keep the pipes open after bash exits.
        for pump in pumps.into_iter().flatten() {
            let _ = tokio::time::timeout(Duration::from_secs(2), pump).await;
        }
        let text = collected(&output);

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            return Ok(format!("exit code {code}:\n{text}"));
        }
        if text.is_empty() {
            return Ok("(no output)".into());
        }
        Ok(text)
    }
}

/// Copy a child stream into the shared buffer until EOF.
fn pump<R>(mut stream: R, sink: Arc<Mutex<Vec<u8>>>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.lock().extend_from_slice(&buf[..n]),
            }
        }
    })
}

fn collected(output: &Mutex<Vec<u8>>) -> String {
    String::from_utf8_lossy(&output.lock()).into_owned()
}
