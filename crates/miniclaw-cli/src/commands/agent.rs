use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

use miniclaw_config::MiniclawConfig;
use miniclaw_core::Result;
use miniclaw_runtime::{AgentLoop, ToolRegistry};

const EXIT_WORDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

pub(super) async fn cmd_agent(
    config: &MiniclawConfig,
    config_path: &Path,
    message: Option<String>,
    session: String,
) -> Result<()> {
    let provider = super::build_provider(config, config_path)?;
    let agent = super::build_agent(config, provider, ToolRegistry::with_builtins());

    match message {
        Some(text) => {
            let reply = agent.process_interactive(&session, None, &text).await?;
            println!("{reply}");
            Ok(())
        }
        None => run_interactive(&agent, &session).await,
    }
}

async fn run_interactive(agent: &AgentLoop, session: &str) -> Result<()> {
    println!("🐾 miniclaw interactive mode. Type /help for commands, exit/quit to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nYou: ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_word(line) {
            println!("Goodbye!");
            break;
        }

        match agent.process_interactive(session, None, line).await {
            Ok(reply) => println!("\nAssistant: {reply}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}

fn is_exit_word(line: &str) -> bool {
    let lower = line.to_lowercase();
    EXIT_WORDS.contains(&lower.as_str())
}
