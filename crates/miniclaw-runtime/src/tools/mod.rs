//! Built-in tools exposed to the model.
//!
//! Filesystem, shell and web tools are stateless and registered by
//! [`register_builtins`]. The cron and messaging tools hold handles to the
//! scheduler and outbound channel, so the gateway registers them itself.

pub mod fs;
pub mod message;
pub mod schedule;
pub mod shell;
pub mod web;

pub use fs::{EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};
pub use message::SendMessageTool;
pub use schedule::{CronAddTool, CronListTool, CronRemoveTool};
pub use shell::ExecTool;
pub use web::WebFetchTool;

use crate::registry::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;

pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(ReadFileTool));
    registry.register(Arc::new(WriteFileTool));
    registry.register(Arc::new(EditFileTool));
    registry.register(Arc::new(ListDirTool));
    registry.register(Arc::new(ExecTool::default()));
    registry.register(Arc::new(WebFetchTool::new()));
}

/// A string argument, empty when absent. Presence of required fields is
/// checked by the registry before a tool runs.
pub(crate) fn str_arg<'a>(input: &'a Value, key: &str) -> &'a str {
    input[key].as_str().unwrap_or_default()
}
