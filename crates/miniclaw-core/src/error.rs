use thiserror::Error;

/// Unified error type for the miniclaw runtime.
#[derive(Error, Debug)]
pub enum MiniclawError {
    #[error("timed out: {0}")]
    Timeout(String),

    // ── LLM errors ─────────────────────────────────────────────
    #[error("LLM error: {0}")]
    LlmProvider(String),

    #[error("LLM error: rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Tool errors ────────────────────────────────────────────
    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    #[error("{tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("invalid input for {tool}: {reason}")]
    InvalidToolInput { tool: String, reason: String },

    // ── Channel errors ─────────────────────────────────────────
    #[error("channel error: {channel}: {reason}")]
    Channel { channel: String, reason: String },

    // ── Session errors ─────────────────────────────────────────
    #[error("session error: {key}: {reason}")]
    Session { key: String, reason: String },

    // ── Scheduling errors ──────────────────────────────────────
    #[error("invalid schedule {expression:?}: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("job {0:?} not found")]
    JobNotFound(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl MiniclawError {
    /// Shorthand for a tool-side failure.
    pub fn tool(tool: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MiniclawError>;
