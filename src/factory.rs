use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::provider::ProviderAdapter;
use crate::providers::{AnthropicProvider, GoogleProvider, OllamaProvider, OpenAIProvider};
use crate::{Error, ProviderId};

/// Factory for creating provider adapters.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Build a fresh cloud adapter for `id` using `api_key`.
    ///
    /// Base URL overrides from `config` are honoured. Adapters are never pooled:
    /// every call returns a new one bound to the key it was given.
    pub fn create_cloud(
        id: ProviderId,
        api_key: String,
        config: &GatewayConfig,
    ) -> Result<Arc<dyn ProviderAdapter>, Error> {
        let base_url = config.base_url(id).map(str::to_string);

        let provider: Arc<dyn ProviderAdapter> = match id {
            ProviderId::OpenAI => Arc::new(match base_url {
                Some(url) => OpenAIProvider::new_with_base_url(api_key, url)?,
                None => OpenAIProvider::new(api_key)?,
            }),
            ProviderId::Anthropic => Arc::new(match base_url {
                Some(url) => AnthropicProvider::new_with_base_url(api_key, url)?,
                None => AnthropicProvider::new(api_key)?,
            }),
            ProviderId::Google => Arc::new(match base_url {
                Some(url) => GoogleProvider::new_with_base_url(api_key, url)?,
                None => GoogleProvider::new(api_key)?,
            }),
            ProviderId::Ollama => {
                return Err(Error::config(
                    "Ollama is the local daemon; use ProviderFactory::create_local",
                ))
            }
        };

        Ok(provider)
    }

    /// Build the local daemon adapter from the configured endpoint and timeouts.
    pub fn create_local(config: &GatewayConfig) -> Result<OllamaProvider, Error> {
        OllamaProvider::with_timeouts(config.ollama_endpoint.clone(), config.timeouts)
    }
}
