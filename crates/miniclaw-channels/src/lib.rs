//! # miniclaw-channels
//!
//! Messaging channel adapters. Telegram is the only one: long polling for
//! inbound messages, HTML-formatted chunked replies outbound.

pub mod adapter;
pub mod format;
pub mod telegram;

pub use adapter::{Channel, ChannelEvent, IncomingMessage, OutgoingMessage};
pub use telegram::TelegramChannel;
