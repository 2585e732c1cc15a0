//! Picks the backend that serves a request.
//!
//! The local daemon is always preferred when it answers its probe; otherwise the
//! first cloud vendor in [`ProviderId::CLOUD_PRIORITY`] with a key wins. An
//! explicit preference never falls through to another backend.

use std::fmt;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::credentials::CredentialStore;
use crate::factory::ProviderFactory;
use crate::provider::ProviderAdapter;
use crate::providers::OllamaProvider;
use crate::{Error, ProviderId, ProviderMeta};

/// The adapter chosen for one request, plus what the consumer is told about it.
#[derive(Clone)]
pub struct RouterResult {
    pub provider: Arc<dyn ProviderAdapter>,
    pub meta: ProviderMeta,
}

impl RouterResult {
    fn new(provider: Arc<dyn ProviderAdapter>) -> Self {
        let meta = ProviderMeta::for_provider(provider.id());
        Self { provider, meta }
    }
}

impl fmt::Debug for RouterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterResult").field("meta", &self.meta).finish()
    }
}

pub struct Router {
    local: Arc<OllamaProvider>,
    credentials: Arc<dyn CredentialStore>,
    config: GatewayConfig,
}

impl Router {
    /// Build a router. The local adapter is created once, here.
    pub fn new(config: GatewayConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self, Error> {
        let local = Arc::new(ProviderFactory::create_local(&config)?);

        Ok(Self {
            local,
            credentials,
            config,
        })
    }

    /// The long-lived local daemon adapter.
    pub fn local(&self) -> Arc<OllamaProvider> {
        Arc::clone(&self.local)
    }

    /// Probe the local daemon.
    pub async fn check_local(&self) -> bool {
        self.local.probe().await
    }

    /// Choose an adapter for a request.
    pub async fn resolve(&self, preferred: Option<ProviderId>) -> Result<RouterResult, Error> {
        match preferred {
            Some(ProviderId::Ollama) => {
                if self.check_local().await {
                    return Ok(RouterResult::new(self.local.clone()));
                }
                tracing::debug!("local daemon explicitly requested but unavailable");
                Err(Error::LocalUnavailable)
            }
            Some(id) => match self.available_cloud(id).await {
                Some(provider) => Ok(RouterResult::new(provider)),
                None => {
                    tracing::debug!(provider = %id, "explicitly requested provider unavailable");
                    Err(Error::ProviderUnavailable(id))
                }
            },
            None => {
                if self.check_local().await {
                    tracing::debug!("routing to local daemon");
                    return Ok(RouterResult::new(self.local.clone()));
                }

                for id in ProviderId::CLOUD_PRIORITY {
                    if let Some(provider) = self.available_cloud(id).await {
                        tracing::debug!(provider = %id, "local daemon down, falling back to cloud");
                        return Ok(RouterResult::new(provider));
                    }
                }

                tracing::debug!("no provider available");
                Err(Error::NoProviderAvailable)
            }
        }
    }

    /// Direct lookup without probing: the local singleton, or a freshly built
    /// cloud adapter when a key is stored.
    pub fn resolve_by_id(&self, id: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        if id.is_local() {
            let local: Arc<dyn ProviderAdapter> = self.local.clone();
            return Some(local);
        }
        self.build_cloud(id)
    }

    fn build_cloud(&self, id: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        let api_key = self.credentials.get(id).filter(|key| !key.is_empty())?;

        match ProviderFactory::create_cloud(id, api_key, &self.config) {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(provider = %id, error = %e, "failed to build provider");
                None
            }
        }
    }

    async fn available_cloud(&self, id: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        let provider = self.build_cloud(id)?;
        let available = provider.probe().await;
        available.then_some(provider)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("local", &self.local.base_url())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
