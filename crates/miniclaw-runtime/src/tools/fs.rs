use async_trait::async_trait;
use miniclaw_config::expand_home;
use miniclaw_core::{AgentTool, MiniclawError, Result, Tool, ToolContext};
use serde_json::{Value, json};

use super::str_arg;

pub struct ReadFileTool;

#[async_trait]
impl AgentTool for ReadFileTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "read_file".into(),
            description: "Read the full contents of a file from the filesystem.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "File path to read."}
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<String> {
        let path = expand_home(str_arg(&input, "path"));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MiniclawError::tool("read_file", e))
    }
}

pub struct WriteFileTool;

#[async_trait]
impl AgentTool for WriteFileTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "write_file".into(),
            description:
                "Write content to a file, creating it and any parent directories as needed.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "File path to write."},
                    "content": {"type": "string", "description": "Content to write."}
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<String> {
        let raw_path = str_arg(&input, "path");
        let content = str_arg(&input, "content");
        let path = expand_home(raw_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MiniclawError::tool("write_file", e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| MiniclawError::tool("write_file", e))?;
        Ok(format!("Written {} bytes to {raw_path}", content.len()))
    }
}

pub struct EditFileTool;

#[async_trait]
impl AgentTool for EditFileTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "edit_file".into(),
            description: "Replace the first occurrence of old_text with new_text in a file.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "File path to edit."},
                    "old_text": {"type": "string", "description": "Exact text to find."},
                    "new_text": {"type": "string", "description": "Replacement text."}
                },
                "required": ["path", "old_text", "new_text"]
            }),
        }
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<String> {
        let raw_path = str_arg(&input, "path");
        let old_text = str_arg(&input, "old_text");
        let new_text = str_arg(&input, "new_text");
        let path = expand_home(raw_path);

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MiniclawError::tool("edit_file", e))?;
        if old_text.is_empty() || !content.contains(old_text) {
            return Err(MiniclawError::tool(
                "edit_file",
                format!("old_text not found in {raw_path}"),
            ));
        }
        let updated = content.replacen(old_text, new_text, 1);
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| MiniclawError::tool("edit_file", e))?;
        Ok("File edited successfully.".into())
    }
}

pub struct ListDirTool;

#[async_trait]
impl AgentTool for ListDirTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "list_dir".into(),
            description: "List files and directories in a given path.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Directory path to list."}
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<String> {
        let path = expand_home(str_arg(&input, "path"));
        let mut dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| MiniclawError::tool("list_dir", e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| MiniclawError::tool("list_dir", e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
        }
        if entries.is_empty() {
            return Ok("(empty directory)".into());
        }
        entries.sort();
        Ok(entries
            .iter()
            .map(|(name, is_dir)| {
                let kind = if *is_dir { "dir" } else { "file" };
                format!("[{kind}] {name}")
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
