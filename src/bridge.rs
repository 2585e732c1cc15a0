//! Connects consumers to providers.
//!
//! A request is routed synchronously so the consumer immediately learns which
//! backend serves it; the fragments are then relayed in a background task over
//! the consumer's [`EventSender`].

use std::sync::Arc;

use futures_util::StreamExt;

use crate::channel::EventSender;
use crate::provider::ProviderAdapter;
use crate::router::{Router, RouterResult};
use crate::{CompletionOptions, Error, GenerateRequest, ProviderId, ProviderMeta, StreamEvent};

/// What a consumer session talks to.
#[async_trait::async_trait]
pub trait Gateway: Send + Sync {
    /// Route `request` and start streaming its fragments to `events`.
    ///
    /// Returns once a backend is chosen, before any fragment is produced.
    async fn generate(
        &self,
        request: GenerateRequest,
        events: EventSender,
    ) -> Result<ProviderMeta, Error>;
}

#[async_trait::async_trait]
impl<G: Gateway + ?Sized> Gateway for Arc<G> {
    async fn generate(
        &self,
        request: GenerateRequest,
        events: EventSender,
    ) -> Result<ProviderMeta, Error> {
        (**self).generate(request, events).await
    }
}

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Every fragment and the `End` event were delivered.
    Completed,
    /// The generation failed and an `Error` event was delivered.
    Failed,
    /// The consumer went away; delivery stopped.
    Detached,
}

#[derive(Debug, Clone)]
pub struct Bridge {
    router: Arc<Router>,
}

impl Bridge {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Whether the local daemon is reachable.
    pub async fn check_availability(&self) -> bool {
        self.router.check_local().await
    }

    /// Models of `provider`; empty when it has no key or cannot be reached.
    pub async fn list_models(&self, provider: ProviderId) -> Vec<String> {
        match self.router.resolve_by_id(provider) {
            Some(adapter) => adapter.list_models().await,
            None => Vec::new(),
        }
    }

    /// Drive one generation to its terminal event.
    ///
    /// Sends a `Chunk` per fragment in production order, then exactly one `End`
    /// or `Error`. Nothing is sent after the terminal event.
    pub async fn relay(
        provider: Arc<dyn ProviderAdapter>,
        prompt: String,
        options: CompletionOptions,
        events: EventSender,
    ) -> RelayOutcome {
        if events.is_closed() {
            return RelayOutcome::Detached;
        }

        let completion = match provider.complete(&prompt, &options).await {
            Ok(completion) => completion,
            Err(e) => return Self::fail(&events, e),
        };

        let mut fragments = completion.into_stream();
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => {
                    if !events.send(StreamEvent::chunk(text)) {
                        return RelayOutcome::Detached;
                    }
                }
                Err(e) => return Self::fail(&events, e),
            }
        }

        if events.send(StreamEvent::End) {
            RelayOutcome::Completed
        } else {
            RelayOutcome::Detached
        }
    }

    fn fail(events: &EventSender, error: Error) -> RelayOutcome {
        tracing::warn!(generation = %events.generation(), error = %error, "generation failed");
        if events.send(StreamEvent::error(error.to_string())) {
            RelayOutcome::Failed
        } else {
            RelayOutcome::Detached
        }
    }
}

#[async_trait::async_trait]
impl Gateway for Bridge {
    async fn generate(
        &self,
        request: GenerateRequest,
        events: EventSender,
    ) -> Result<ProviderMeta, Error> {
        let RouterResult { provider, meta } = self.router.resolve(request.provider).await?;
        let generation = events.generation();

        tracing::debug!(
            %generation,
            provider = %meta.provider_id,
            is_local = meta.is_local,
            "starting generation"
        );

        // Detached: cancellation only unsubscribes the consumer
        tokio::spawn(async move {
            let outcome = Self::relay(provider, request.prompt, request.options, events).await;
            tracing::debug!(%generation, ?outcome, "generation relay finished");
        });

        Ok(meta)
    }
}
