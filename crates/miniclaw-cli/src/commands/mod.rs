use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use miniclaw_config::{ConfigLoader, MiniclawConfig};
use miniclaw_core::{MiniclawError, Result};
use miniclaw_llm::{AnthropicProvider, Credential, LlmProvider};
use miniclaw_memory::{MemoryStore, SessionStore};
use miniclaw_runtime::{AgentLoop, AgentSettings, JobScheduler, ToolRegistry};

mod agent;
mod cron;
mod gateway;
mod onboard;

/// 🐾 miniclaw — Minimal personal AI agent
#[derive(Parser)]
#[command(name = "miniclaw", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to miniclaw.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (interactive or single message)
    Agent {
        /// Single message to send; omit for interactive mode
        #[arg(short, long)]
        message: Option<String>,
        /// Session key to use
        #[arg(short, long, default_value = "cli:direct")]
        session: String,
    },
    /// Start the Telegram gateway (long polling, cron jobs, heartbeat)
    Gateway,
    /// Manage scheduled cron jobs
    Cron {
        #[command(subcommand)]
        action: CronAction,
    },
    /// Show configuration and auth status
    Status,
    /// Initialise miniclaw config and workspace
    Onboard,
    /// Show current configuration (secrets masked)
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CronAction {
    /// List all scheduled jobs
    List,
    /// Add a scheduled job
    Add {
        /// Job name
        #[arg(long)]
        name: String,
        /// Cron expression or shorthand (@every 1h, @daily, etc.)
        #[arg(long)]
        schedule: String,
        /// Message the agent receives when the job fires
        #[arg(long)]
        message: String,
        /// Telegram chat ID to send the response to
        #[arg(long, default_value = "")]
        chat_id: String,
    },
    /// Remove a scheduled job by ID
    #[command(visible_alias = "rm")]
    Remove { id: String },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Load config first so logging can follow its level and format.
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        let log_level = if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "error".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone())
        };
        init_tracing(&log_level, &config.logging.format);

        let config_path = config_loader.path();
        match self.command {
            Commands::Agent { message, session } => {
                agent::cmd_agent(&config, config_path, message, session).await
            }
            Commands::Gateway => gateway::cmd_gateway(&config, config_path).await,
            Commands::Cron { action } => cron::cmd_cron(&config, action).await,
            Commands::Status => cmd_status(&config, config_path).await,
            Commands::Onboard => onboard::cmd_onboard(config_path),
            Commands::Config { json } => cmd_config(&config, json),
        }
    }
}

/// Logs go to stderr so replies printed by `agent -m` stay alone on stdout.
fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

/// The chat backend configured by `[provider]`.
fn build_provider(config: &MiniclawConfig, config_path: &Path) -> Result<Arc<dyn LlmProvider>> {
    let credential = Credential::from_parts(
        config.provider.api_key.as_deref(),
        config.provider.access_token.as_deref(),
    )
    .ok_or_else(|| {
        MiniclawError::Config(format!(
            "not authenticated; add provider.api_key to {} or set ANTHROPIC_API_KEY",
            config_path.display()
        ))
    })?;
    Ok(Arc::new(
        AnthropicProvider::new(credential).with_base_url(config.provider.base_url.as_str()),
    ))
}

fn build_agent(
    config: &MiniclawConfig,
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
) -> AgentLoop {
    AgentLoop::new(
        provider,
        tools,
        SessionStore::new(config.sessions_dir()),
        MemoryStore::new(config.workspace_path()),
        AgentSettings::from(&config.agent),
    )
}

async fn cmd_status(config: &MiniclawConfig, config_path: &Path) -> Result<()> {
    let ok = style("✅").green();
    let missing = style("❌").red();

    println!("{}", style("🐾 miniclaw status").bold());
    println!("==================");
    println!("Config:    {}", config_path.display());
    println!("Workspace: {}", config.workspace_path().display());
    println!();

    println!("Provider: Claude");
    if config.provider.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
        println!("  Auth:  API key {ok}");
    } else if config.is_authenticated() {
        println!("  Auth:  OAuth token {ok}");
    } else {
        println!("  Auth:  {missing} Not authenticated (set provider.api_key or ANTHROPIC_API_KEY)");
    }
    println!("  Model: {}", config.agent.model);
    println!();

    println!("Telegram:");
    if config.telegram.token.as_deref().is_some_and(|t| !t.is_empty()) {
        println!("  Token: configured {ok}");
    } else {
        println!("  Token: {missing} Not configured");
    }
    if config.telegram.allow_from.is_empty() {
        println!("  AllowFrom: (allow all)");
    } else {
        println!("  AllowFrom: {}", config.telegram.allow_from.join(", "));
    }
    println!();

    println!("Heartbeat:");
    if config.heartbeat.enabled {
        println!(
            "  Enabled: every {} min",
            config.heartbeat.interval().as_secs() / 60
        );
    } else {
        println!("  Enabled: no");
    }
    println!(
        "  Chat:    {}",
        config.heartbeat.chat_id.as_deref().unwrap_or("(none, replies not delivered)")
    );
    println!();

    match JobScheduler::new(config.cron_path()) {
        Ok(scheduler) => println!("Cron jobs: {}", scheduler.list().await.len()),
        Err(e) => println!("Cron jobs: {missing} {e}"),
    }
    Ok(())
}

fn cmd_config(config: &MiniclawConfig, json: bool) -> Result<()> {
    let shown = config.redacted();
    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        println!(
            "{}",
            toml::to_string_pretty(&shown)
                .map_err(|e| MiniclawError::Config(format!("failed to render config: {e}")))?
        );
    }
    Ok(())
}
