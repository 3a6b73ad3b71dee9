use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::MiniclawConfig;

/// Loads the miniclaw configuration.
pub struct ConfigLoader {
    config: MiniclawConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > MINICLAW_CONFIG env > ~/.miniclaw/miniclaw.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("MINICLAW_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".miniclaw")
            .join("miniclaw.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> miniclaw_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::parse_file(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            MiniclawConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        for w in config.validate()? {
            warn!("{}", w);
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn parse_file(path: &Path) -> miniclaw_core::Result<MiniclawConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<MiniclawConfig>(&raw).map_err(|e| {
            miniclaw_core::MiniclawError::Config(format!(
                "failed to parse {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// A copy of the loaded config.
    pub fn get(&self) -> MiniclawConfig {
        self.config.clone()
    }

    /// Path the config was resolved to.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (MINICLAW_AGENT_MODEL, MINICLAW_WORKSPACE, etc.)
    fn apply_env_overrides(config: MiniclawConfig) -> MiniclawConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(
        mut config: MiniclawConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> MiniclawConfig {
        if let Some(v) = lookup("MINICLAW_AGENT_MODEL") {
            config.agent.model = v;
        }
        if let Some(v) = lookup("MINICLAW_WORKSPACE") {
            config.workspace = v;
        }
        if let Some(v) = lookup("MINICLAW_LOG_LEVEL") {
            config.logging.level = v;
        }
        // Credentials: config file takes priority, env is the fallback.
        if config.provider.api_key.is_none() && config.provider.access_token.is_none() {
            if let Some(v) = lookup("ANTHROPIC_API_KEY").filter(|v| !v.is_empty()) {
                config.provider.api_key = Some(v);
            }
        }
        if config.telegram.token.is_none() {
            if let Some(v) = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
                config.telegram.token = Some(v);
            }
        }
        config
    }

    /// Write a config to `path` as TOML, readable only by the owner.
    pub fn save(config: &MiniclawConfig, path: &Path) -> miniclaw_core::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(config).map_err(|e| {
            miniclaw_core::MiniclawError::Config(format!("failed to serialize config: {e}"))
        })?;
        std::fs::write(path, raw)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }
}
