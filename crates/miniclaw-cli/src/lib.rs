//! # miniclaw-cli
//!
//! Command-line interface for the miniclaw agent runtime.
//!
//! ## Commands
//!
//! - `miniclaw agent`: Chat in the terminal (one message or interactive)
//! - `miniclaw gateway`: Run the Telegram gateway with cron and heartbeat
//! - `miniclaw cron`: List, add and remove scheduled jobs
//! - `miniclaw status`: Show configuration and auth status
//! - `miniclaw onboard`: Create the default config and workspace
//! - `miniclaw config`: Print the effective configuration

pub mod commands;

pub use commands::Cli;
