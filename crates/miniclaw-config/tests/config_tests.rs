#[cfg(test)]
mod tests {
    use miniclaw_config::ConfigLoader;
    use miniclaw_config::schema::*;
    use miniclaw_core::MiniclawError;
    use std::collections::HashMap;
    use std::io::Write;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.model, "claude-opus-4-5");
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.memory_window, 50);
    }

    #[test]
    fn test_root_defaults() {
        let config = MiniclawConfig::default();
        assert_eq!(config.workspace, "~/.miniclaw/workspace");
        assert_eq!(config.provider.base_url, "https://api.anthropic.com/v1");
        assert!(config.heartbeat.enabled);
        assert_eq!(config.heartbeat.interval_minutes, 30);
        assert!(config.telegram.allow_from.is_empty());
        assert!(!config.is_authenticated());
    }

    #[test]
    fn test_heartbeat_zero_interval_falls_back() {
        let hb = HeartbeatConfig {
            interval_minutes: 0,
            ..Default::default()
        };
        assert_eq!(hb.interval(), std::time::Duration::from_secs(30 * 60));
        let hb = HeartbeatConfig {
            interval_minutes: 5,
            ..Default::default()
        };
        assert_eq!(hb.interval(), std::time::Duration::from_secs(300));
    }

    // ── Paths ──────────────────────────────────────────────────

    #[test]
    fn test_derived_paths_sit_next_to_workspace() {
        let config = MiniclawConfig {
            workspace: "/srv/miniclaw/workspace".into(),
            ..Default::default()
        };
        assert_eq!(
            config.sessions_dir(),
            std::path::PathBuf::from("/srv/miniclaw/sessions")
        );
        assert_eq!(
            config.cron_path(),
            std::path::PathBuf::from("/srv/miniclaw/cron.json")
        );
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("~/x/y");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("x/y"));
        assert_eq!(expand_home("/abs"), std::path::PathBuf::from("/abs"));
        assert_eq!(expand_home("rel/p"), std::path::PathBuf::from("rel/p"));
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[agent]
model = "claude-sonnet-4-5"

[telegram]
token = "123:abc"
allow_from = ["42", "alice"]
"#;
        let config: MiniclawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.model, "claude-sonnet-4-5");
        assert_eq!(config.agent.max_tokens, 8192);
        assert_eq!(config.telegram.token.as_deref(), Some("123:abc"));
        assert_eq!(config.telegram.allow_from, vec!["42", "alice"]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = MiniclawConfig::default();
        config.provider.api_key = Some("sk-ant-secret".into());
        config.telegram.token = Some("123:abc".into());
        let shown = config.redacted();
        assert_eq!(shown.provider.api_key.as_deref(), Some("********"));
        assert_eq!(shown.telegram.token.as_deref(), Some("********"));
        assert!(shown.provider.access_token.is_none());
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-ant-secret"));
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_default_config_validates() {
        let warnings = MiniclawConfig::default().validate().unwrap();
        assert!(
            warnings
                .iter()
                .all(|w| w.severity != WarningSeverity::Error)
        );
    }

    #[test]
    fn test_zero_iterations_is_an_error() {
        let mut config = MiniclawConfig::default();
        config.agent.max_iterations = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            &err,
            MiniclawError::ConfigValidation { field, .. } if field == "agent.max_iterations"
        ));
        assert!(err.to_string().starts_with("config validation failed: agent.max_iterations: "));
    }

    #[test]
    fn test_empty_model_is_an_error() {
        let mut config = MiniclawConfig::default();
        config.agent.model = "  ".into();
        assert!(config.validate().unwrap_err().to_string().contains("agent.model"));
    }

    #[test]
    fn test_unknown_log_level_is_a_warning() {
        let mut config = MiniclawConfig::default();
        config.logging.level = "loud".into();
        let warnings = config.validate().unwrap();
        let w = warnings
            .iter()
            .find(|w| w.field == "logging.level")
            .unwrap();
        assert_eq!(w.severity, WarningSeverity::Warning);
        assert!(w.to_string().contains("↳ Valid values"));
    }

    // ── Env overrides ──────────────────────────────────────────

    #[test]
    fn test_overrides_replace_model_and_workspace() {
        let vars: HashMap<&str, &str> = [
            ("MINICLAW_AGENT_MODEL", "claude-haiku-4-5"),
            ("MINICLAW_WORKSPACE", "/tmp/ws"),
        ]
        .into_iter()
        .collect();
        let config = ConfigLoader::apply_overrides(MiniclawConfig::default(), |k| {
            vars.get(k).map(|v| v.to_string())
        });
        assert_eq!(config.agent.model, "claude-haiku-4-5");
        assert_eq!(config.workspace, "/tmp/ws");
    }

    #[test]
    fn test_api_key_env_is_only_a_fallback() {
        let lookup = |k: &str| (k == "ANTHROPIC_API_KEY").then(|| "from-env".to_string());

        let config = ConfigLoader::apply_overrides(MiniclawConfig::default(), lookup);
        assert_eq!(config.provider.api_key.as_deref(), Some("from-env"));

        let mut configured = MiniclawConfig::default();
        configured.provider.api_key = Some("from-file".into());
        let config = ConfigLoader::apply_overrides(configured, lookup);
        assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));

        let mut oauth = MiniclawConfig::default();
        oauth.provider.access_token = Some("oauth".into());
        let config = ConfigLoader::apply_overrides(oauth, lookup);
        assert!(config.provider.api_key.is_none());
    }

    // ── Loader tests ───────────────────────────────────────────

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(loader.get().agent.max_iterations, 20);
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miniclaw.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[agent\nmodel = ").unwrap();
        let err = ConfigLoader::load(Some(&path)).err().unwrap();
        assert!(err.to_string().contains("failed to parse"));
        assert!(err.to_string().contains("miniclaw.toml"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miniclaw.toml");
        std::fs::write(&path, "[agent]\nmax_tokens = 0\n").unwrap();
        let err = ConfigLoader::load(Some(&path)).err().unwrap();
        assert!(err.to_string().contains("agent.max_tokens"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("miniclaw.toml");
        let mut config = MiniclawConfig::default();
        config.agent.memory_window = 12;
        config.heartbeat.chat_id = Some("99".into());
        ConfigLoader::save(&config, &path).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let loader = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(loader.get().agent.memory_window, 12);
        assert_eq!(loader.get().heartbeat.chat_id.as_deref(), Some("99"));

        assert_eq!(loader.path(), path.as_path());
    }
}
