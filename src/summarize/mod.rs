// src/summarize/mod.rs
// Summarization Module - remote LLM adapters and prompt composition

mod chat_api;
mod prompt;

pub use chat_api::ChatApiAdapter;
pub use prompt::compose_system_prompt;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::task::OperationError;

/// Everything the chat call needs besides the model choice.
#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub system_prompt: String,
    pub content: String,
}

/// Unified summarization adapter trait
#[async_trait]
pub trait SummarizeAdapter: Send + Sync {
    /// Generate a summary for the request's content
    async fn summarize(
        &self,
        request: &SummarizeRequest,
        model: &str,
        token: &CancellationToken,
    ) -> Result<String, OperationError>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Adapters keyed by the registry's provider group name.
#[derive(Default)]
pub struct ProviderSet {
    adapters: HashMap<String, Arc<dyn SummarizeAdapter>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_api_key(api_key: Option<&str>) -> Self {
        let mut set = Self::new();
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            set = set.with_adapter("OpenAI", Arc::new(ChatApiAdapter::new(key.to_string())));
        }
        tracing::info!("Summarization providers available: {}", set.adapters.len());
        set
    }

    pub fn with_adapter(mut self, provider: &str, adapter: Arc<dyn SummarizeAdapter>) -> Self {
        self.adapters.insert(provider.to_string(), adapter);
        self
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn SummarizeAdapter>> {
        self.adapters.get(provider).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_set_requires_a_key() {
        assert!(ProviderSet::from_api_key(None).get("OpenAI").is_none());
        assert!(ProviderSet::from_api_key(Some("sk-x")).get("OpenAI").is_some());
    }
}
