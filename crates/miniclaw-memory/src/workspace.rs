use miniclaw_core::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SOUL_FILE: &str = "SOUL.md";
pub const AGENTS_FILE: &str = "AGENTS.md";
pub const USER_FILE: &str = "USER.md";
pub const MEMORY_FILE: &str = "MEMORY.md";
pub const HISTORY_FILE: &str = "HISTORY.md";
pub const HEARTBEAT_FILE: &str = "HEARTBEAT.md";

/// Long-term memory documents inside the workspace directory.
///
/// Reads never fail: a missing document reads as empty.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    workspace: PathBuf,
}

impl MemoryStore {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn read_memory(&self) -> String {
        self.read_raw(MEMORY_FILE)
    }

    /// Overwrite MEMORY.md.
    pub fn write_memory(&self, content: &str) -> Result<()> {
        std::fs::create_dir_all(&self.workspace)?;
        std::fs::write(self.workspace.join(MEMORY_FILE), content)?;
        Ok(())
    }

    pub fn read_history(&self) -> String {
        self.read_raw(HISTORY_FILE)
    }

    /// Append one entry, newline-terminated, to HISTORY.md.
    pub fn append_history(&self, entry: &str) -> Result<()> {
        std::fs::create_dir_all(&self.workspace)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.workspace.join(HISTORY_FILE))?;
        writeln!(file, "{entry}")?;
        Ok(())
    }

    /// A workspace document with surrounding whitespace trimmed, or `None`
    /// when it is missing or blank.
    pub fn read_doc(&self, name: &str) -> Option<String> {
        let content = self.read_raw(name);
        let trimmed = content.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn read_raw(&self, name: &str) -> String {
        std::fs::read_to_string(self.workspace.join(name)).unwrap_or_default()
    }
}
