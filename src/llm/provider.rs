use async_trait::async_trait;

use crate::agent_engine::event_bus::EventBus;
use crate::errors::SheetPilotResult;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

/// Unified LLM provider trait. All providers implement this trait.
/// New providers only need to implement this trait and register in config.toml.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    /// Runs one chat completion and returns the accumulated reply.
    /// Streaming providers forward chunks on `events` as they arrive.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        cfg: &CallConfig,
        events: &EventBus,
    ) -> SheetPilotResult<LlmResponse>;
}
