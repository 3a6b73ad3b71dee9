use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration, read from `miniclaw.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniclawConfig {
    /// Workspace directory holding SOUL.md, USER.md, MEMORY.md, etc.
    pub workspace: String,
    pub agent: AgentConfig,
    pub provider: ProviderConfig,
    pub telegram: TelegramConfig,
    pub heartbeat: HeartbeatConfig,
    pub logging: LoggingConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier sent to the Anthropic API.
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Maximum agent loop iterations before the fallback reply is returned.
    pub max_iterations: u32,
    /// Number of recent session messages sent with each request. Consolidation
    /// starts once more than this many messages are unconsolidated.
    pub memory_window: usize,
    /// Wall-clock seconds allowed per interactive request. 0 = no deadline.
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-opus-4-5".into(),
            max_tokens: 8192,
            max_iterations: 20,
            memory_window: 50,
            request_timeout_secs: 300,
        }
    }
}

// ── Provider ───────────────────────────────────────────────────

/// Credentials for the chat backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Anthropic API key. Can also be set via ANTHROPIC_API_KEY.
    /// Config file takes priority over the environment variable.
    pub api_key: Option<String>,
    /// OAuth access token, used as a bearer token when no API key is set.
    pub access_token: Option<String>,
    /// Base URL of the Messages API.
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_token: None,
            base_url: "https://api.anthropic.com/v1".into(),
        }
    }
}

// ── Telegram ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather. Can also be set via TELEGRAM_BOT_TOKEN.
    pub token: Option<String>,
    /// Allowed user ids or usernames. Empty allows everyone.
    pub allow_from: Vec<String>,
}

// ── Heartbeat ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    /// Minutes between ticks. 0 falls back to 30.
    pub interval_minutes: u64,
    /// Telegram chat that receives heartbeat reports.
    pub chat_id: Option<String>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            chat_id: None,
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> std::time::Duration {
        let minutes = if self.interval_minutes == 0 {
            30
        } else {
            self.interval_minutes
        };
        std::time::Duration::from_secs(minutes * 60)
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Default for root ───────────────────────────────────────────

impl Default for MiniclawConfig {
    fn default() -> Self {
        Self {
            workspace: "~/.miniclaw/workspace".into(),
            agent: AgentConfig::default(),
            provider: ProviderConfig::default(),
            telegram: TelegramConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ── Derived paths ──────────────────────────────────────────────

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl MiniclawConfig {
    /// The expanded workspace directory.
    pub fn workspace_path(&self) -> PathBuf {
        if self.workspace.is_empty() {
            return expand_home("~/.miniclaw/workspace");
        }
        expand_home(&self.workspace)
    }

    /// Directory next to the workspace that holds sessions and the cron store.
    pub fn data_dir(&self) -> PathBuf {
        let workspace = self.workspace_path();
        workspace
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir().join("sessions")
    }

    pub fn cron_path(&self) -> PathBuf {
        self.data_dir().join("cron.json")
    }

    /// Whether any chat-backend credential is present.
    pub fn is_authenticated(&self) -> bool {
        self.provider.api_key.as_deref().is_some_and(|k| !k.is_empty())
            || self
                .provider
                .access_token
                .as_deref()
                .is_some_and(|t| !t.is_empty())
    }

    /// A copy with credentials replaced by a short marker, for display.
    pub fn redacted(&self) -> Self {
        fn mask(v: &Option<String>) -> Option<String> {
            v.as_ref().map(|_| "********".to_string())
        }
        let mut copy = self.clone();
        copy.provider.api_key = mask(&self.provider.api_key);
        copy.provider.access_token = mask(&self.provider.access_token);
        copy.telegram.token = mask(&self.telegram.token);
        copy
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl MiniclawConfig {
    /// Validate the config and return the non-fatal warnings.
    /// Any Error-severity issue fails with `ConfigValidation` naming the
    /// offending fields.
    pub fn validate(&self) -> miniclaw_core::Result<Vec<ConfigWarning>> {
        let mut warnings = Vec::new();

        // ── Agent ───
        if self.agent.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "agent.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'claude-opus-4-5'".into()),
            });
        }
        if self.agent.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_tokens".into(),
                message: "max_tokens is 0, the agent can't produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 8192".into()),
            });
        }
        if self.agent.max_iterations == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_iterations".into(),
                message: "max_iterations is 0, the agent would never call the model".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 20".into()),
            });
        }
        if self.agent.memory_window < 2 {
            warnings.push(ConfigWarning {
                field: "agent.memory_window".into(),
                message: format!(
                    "memory_window {} keeps no history between turns",
                    self.agent.memory_window
                ),
                severity: WarningSeverity::Warning,
                hint: Some("A window of 50 is typical".into()),
            });
        }

        // ── Heartbeat ───
        if self.heartbeat.enabled && self.heartbeat.interval_minutes == 0 {
            warnings.push(ConfigWarning {
                field: "heartbeat.interval_minutes".into(),
                message: "interval is 0, falling back to 30 minutes".into(),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }
        if self.heartbeat.enabled && self.heartbeat.chat_id.is_none() {
            warnings.push(ConfigWarning {
                field: "heartbeat.chat_id".into(),
                message: "no chat_id, heartbeat replies will not be delivered".into(),
                severity: WarningSeverity::Info,
                hint: Some("Set heartbeat.chat_id to your Telegram chat id".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let (errors, warnings): (Vec<_>, Vec<_>) = warnings
            .into_iter()
            .partition(|w| w.severity == WarningSeverity::Error);

        if !errors.is_empty() {
            let field: Vec<&str> = errors.iter().map(|w| w.field.as_str()).collect();
            let reason: Vec<&str> = errors.iter().map(|w| w.message.as_str()).collect();
            return Err(miniclaw_core::MiniclawError::ConfigValidation {
                field: field.join(", "),
                reason: reason.join("; "),
            });
        }

        Ok(warnings)
    }
}
