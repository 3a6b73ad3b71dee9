//! # miniclaw-core
//!
//! Shared vocabulary for the miniclaw workspace: the error type, conversation
//! messages exchanged with the chat backend, tool definitions and the
//! capability trait every tool implements, and the outbound delivery seam.

pub mod error;
pub mod message;
pub mod sender;
pub mod tool;

pub use error::{MiniclawError, Result};
pub use message::{Message, MessageContent, Role};
pub use sender::MessageSender;
pub use tool::{AgentTool, Tool, ToolCall, ToolContext, ToolResult};
