use std::path::Path;

use miniclaw_config::{ConfigLoader, MiniclawConfig};
use miniclaw_core::Result;
use miniclaw_memory::workspace::{AGENTS_FILE, HEARTBEAT_FILE, SOUL_FILE, USER_FILE};

const STARTER_FILES: &[(&str, &str)] = &[
    (
        SOUL_FILE,
        "# SOUL.md - Who You Are\n\nYou are a helpful personal AI assistant. Be concise, direct, and useful.\n",
    ),
    (
        USER_FILE,
        "# USER.md - About Your User\n\n- Name: (fill in)\n- Timezone: (fill in)\n",
    ),
    (
        AGENTS_FILE,
        "# AGENTS.md - Behaviour Notes\n\n<!-- Add instructions for the agent here. -->\n",
    ),
    (
        HEARTBEAT_FILE,
        "# HEARTBEAT.md\n\n# Add tasks below. Comment-only files are skipped.\n# Example: Check my top unread emails and summarise any urgent ones.\n",
    ),
];

pub(super) fn cmd_onboard(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        print_next_steps(config_path);
        return Ok(());
    }

    let config = MiniclawConfig::default();
    ConfigLoader::save(&config, config_path)?;

    let workspace = config.workspace_path();
    let created = scaffold_workspace(&workspace)?;

    println!("✅ Config created at {}", config_path.display());
    println!("✅ Workspace created at {}", workspace.display());
    if !created.is_empty() {
        println!("✅ Starter files created: {}", created.join(", "));
    }
    print_next_steps(config_path);
    Ok(())
}

/// Create the workspace and any missing starter documents. Existing files
/// are left untouched. Returns the names of the files written.
fn scaffold_workspace(workspace: &Path) -> Result<Vec<&'static str>> {
    std::fs::create_dir_all(workspace)?;
    let mut created = Vec::new();
    for (name, content) in STARTER_FILES {
        let path = workspace.join(name);
        if path.exists() {
            continue;
        }
        std::fs::write(&path, content)?;
        created.push(*name);
    }
    Ok(created)
}

fn print_next_steps(config_path: &Path) {
    let path = config_path.display();
    print!(
        r#"
Next steps:
  1. Add your Anthropic API key to {path}:
       [provider]
       api_key = "sk-ant-..."

     Or export ANTHROPIC_API_KEY.

  2. Add your Telegram bot token:
       [telegram]
       token = "YOUR_BOT_TOKEN"

     Get a token from @BotFather on Telegram.

  3. (Optional) Restrict access:
       [telegram]
       allow_from = ["YOUR_USER_ID"]

  4. (Optional) Edit the workspace files to personalise the agent:
       SOUL.md       persona
       USER.md       about you
       AGENTS.md     behaviour notes
       HEARTBEAT.md  periodic tasks

  5. Start the gateway:
       miniclaw gateway
"#
    );
}
