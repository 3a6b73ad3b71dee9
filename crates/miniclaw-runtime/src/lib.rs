//! # miniclaw-runtime
//!
//! The agent runtime: the tool-calling loop, the background memory
//! consolidation it triggers, and the two schedulers that feed synthetic
//! messages into it.
//!
//! ## Architecture
//!
//! ```text
//!   Telegram ──► Gateway ─┐
//!   Cron jobs ────────────┼──► AgentLoop ──► LlmProvider
//!   Heartbeat ────────────┘        │  ▲
//!                                  ▼  │ tool results
//!                            ToolRegistry
//!                                  │
//!                   SessionStore ◄─┴─► MemoryConsolidator ──► MEMORY.md / HISTORY.md
//! ```

pub mod agent_loop;
pub mod consolidate;
pub mod context;
pub mod gateway;
pub mod heartbeat;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod tools;

pub use agent_loop::{AgentInvoker, AgentLoop, AgentSettings};
pub use consolidate::MemoryConsolidator;
pub use gateway::Gateway;
pub use heartbeat::{Heartbeat, TickOutcome};
pub use registry::ToolRegistry;
pub use schedule::JobSchedule;
pub use scheduler::{CronJob, JobScheduler};
