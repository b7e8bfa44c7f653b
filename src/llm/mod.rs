//! LLM provider implementations

use crate::config::LlmConfig;

mod dapr;
mod error;
mod types;

pub use dapr::DaprChatClient;
pub use error::LlmError;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Send a chat completion request (non-streaming)
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse>;
}

/// Builds the model client a new agent is constructed with
pub trait ModelFactory: Send + Sync {
    fn create(&self, config: &LlmConfig) -> Result<Arc<dyn LlmProvider>>;
}

/// Model clients backed by the Dapr conversation API
#[derive(Debug, Default, Clone, Copy)]
pub struct DaprModelFactory;

impl ModelFactory for DaprModelFactory {
    fn create(&self, config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
        tracing::debug!(
            "Creating Dapr chat client (provider: {}, component: {}, timeout: {}s)",
            config.provider,
            config.component,
            config.timeout_secs
        );
        Ok(Arc::new(DaprChatClient::new(config)?))
    }
}
