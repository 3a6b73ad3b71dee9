//! # miniclaw-memory
//!
//! Conversation state that outlives a single request:
//!
//! - **Sessions**: one JSON file per session key holding the message log and
//!   the consolidation watermark.
//! - **Workspace memory**: `MEMORY.md` (overwritten on each consolidation),
//!   `HISTORY.md` (append-only) and the persona documents read into the
//!   system prompt.

pub mod session;
pub mod workspace;

pub use session::{Session, SessionMessage, SessionStore};
pub use workspace::MemoryStore;
