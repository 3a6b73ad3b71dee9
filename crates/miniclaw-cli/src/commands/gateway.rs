use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use miniclaw_channels::TelegramChannel;
use miniclaw_config::MiniclawConfig;
use miniclaw_core::{MessageSender, MiniclawError, Result};
use miniclaw_memory::MemoryStore;
use miniclaw_runtime::gateway::BOT_COMMANDS;
use miniclaw_runtime::tools::{CronAddTool, CronListTool, CronRemoveTool, SendMessageTool};
use miniclaw_runtime::{Gateway, Heartbeat, JobScheduler, ToolRegistry};

pub(super) async fn cmd_gateway(config: &MiniclawConfig, config_path: &Path) -> Result<()> {
    let token = config
        .telegram
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            MiniclawError::Config(format!(
                "telegram token not configured; add telegram.token to {} or set TELEGRAM_BOT_TOKEN",
                config_path.display()
            ))
        })?;
    let provider = super::build_provider(config, config_path)?;

    let telegram = Arc::new(TelegramChannel::new(token));
    let bot = telegram.get_me().await?;
    info!(bot = %bot, "telegram bot authorized");
    if let Err(e) = telegram.set_commands(BOT_COMMANDS).await {
        warn!(error = %e, "failed to register bot commands");
    }
    let sender: Arc<dyn MessageSender> = telegram.clone();

    let scheduler = Arc::new(JobScheduler::new(config.cron_path())?);
    let mut tools = ToolRegistry::with_builtins();
    tools.register(Arc::new(CronAddTool::new(Arc::clone(&scheduler))));
    tools.register(Arc::new(CronListTool::new(Arc::clone(&scheduler))));
    tools.register(Arc::new(CronRemoveTool::new(Arc::clone(&scheduler))));
    tools.register(Arc::new(SendMessageTool::new(Arc::clone(&sender))));

    let agent = Arc::new(super::build_agent(config, provider, tools));
    scheduler.start(agent.clone(), Some(Arc::clone(&sender))).await;

    let cancel = CancellationToken::new();
    let heartbeat = config.heartbeat.enabled.then(|| {
        let heartbeat = Arc::new(Heartbeat::new(
            agent.clone(),
            Some(Arc::clone(&sender)),
            MemoryStore::new(config.workspace_path()),
            config.heartbeat.interval(),
            config.heartbeat.chat_id.clone(),
        ));
        info!(interval_secs = heartbeat.interval().as_secs(), "heartbeat enabled");
        tokio::spawn(heartbeat.run(cancel.clone()))
    });

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("shutting down");
        signal_cancel.cancel();
    });

    info!("miniclaw gateway starting");
    let gateway = Arc::new(Gateway::new(
        telegram,
        agent.clone(),
        config.telegram.allow_from.clone(),
        agent.settings().request_timeout,
    ));
    let result = gateway.run(cancel.clone()).await;

    cancel.cancel();
    scheduler.stop().await;
    if let Some(task) = heartbeat {
        let _ = task.await;
    }
    result
}

/// Resolves on Ctrl-C or SIGTERM.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
