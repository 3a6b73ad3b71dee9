//! # miniclaw-llm
//!
//! Abstraction over the chat backend. One real adapter (Anthropic Messages
//! API) and a deterministic mock for tests.

pub mod anthropic;
pub mod mock;
pub mod provider;

pub use anthropic::{AnthropicProvider, Credential};
pub use mock::{MockProvider, MockResponse};
pub use provider::{LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};
