//! # miniclaw-config
//!
//! Configuration for the miniclaw runtime. Reads `miniclaw.toml`, then applies
//! environment variable overrides, then validates.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::MiniclawConfig;
pub use schema::{
    AgentConfig, ConfigWarning, HeartbeatConfig, LoggingConfig, ProviderConfig, TelegramConfig,
    WarningSeverity, expand_home,
};
