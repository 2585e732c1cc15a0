//! Consumer-side accumulation of a streaming generation.
//!
//! A [`ClientSession`] keeps at most one generation subscribed. Starting a new
//! one tears down the previous one first, and every listener ignores events
//! that do not carry the current [`GenerationId`].
//!
//! Cancelling only stops the session from listening; the backend call keeps
//! running until it ends on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::bridge::Gateway;
use crate::channel::{EventChannel, Subscription};
use crate::{CompletionOptions, Error, GenerateRequest, GenerationId, ProviderId, ProviderMeta};

/// Settings applied to every generation of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Preferred provider; `None` lets the router pick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl SessionOptions {
    pub fn request(&self, prompt: impl Into<String>) -> GenerateRequest {
        let options = CompletionOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system_prompt: self.system_prompt.clone(),
        };

        GenerateRequest {
            prompt: prompt.into(),
            options,
            provider: self.provider,
        }
    }
}

/// Observable state of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Concatenation of every fragment received for the current generation.
    pub output: String,
    /// Number of fragments received.
    pub fragments: usize,
    pub is_streaming: bool,
    pub error: Option<String>,
    pub provider_used: Option<ProviderId>,
    pub is_local: Option<bool>,
}

struct ActiveGeneration {
    id: GenerationId,
    cancelled: Arc<AtomicBool>,
    _subscriptions: Vec<Subscription>,
}

struct Shared {
    state: watch::Sender<SessionSnapshot>,
    active: Mutex<Option<ActiveGeneration>>,
    /// Most recently started generation, subscribed or not.
    latest: Mutex<Option<GenerationId>>,
}

impl Shared {
    fn active(&self) -> MutexGuard<'_, Option<ActiveGeneration>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `update` if `generation` is still the subscribed one.
    fn update_current(&self, generation: GenerationId, update: impl FnOnce(&mut SessionSnapshot)) {
        let active = self.active();
        match active.as_ref() {
            Some(current) if current.id == generation && !current.cancelled.load(Ordering::Acquire) => {
                self.state.send_modify(update);
            }
            _ => tracing::trace!(%generation, "ignoring event of a superseded generation"),
        }
    }

    /// Close `generation` if it is still the subscribed one.
    fn finish(&self, generation: GenerationId, error: Option<String>) {
        let mut active = self.active();
        let is_current = active.as_ref().is_some_and(|current| current.id == generation);
        let finished = if is_current { active.take() } else { None };

        if finished.is_some() {
            self.state.send_modify(|state| {
                state.is_streaming = false;
                if error.is_some() {
                    state.error = error;
                }
            });
        }
        drop(active);
        // Subscriptions are dropped after the lock is released
        drop(finished);
    }

    /// Record which backend serves `generation`. A fast stream may already
    /// have ended, so this only requires that no newer generation started.
    fn record_meta(&self, generation: GenerationId, meta: ProviderMeta) {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if *latest == Some(generation) {
            self.state.send_modify(|state| {
                state.provider_used = Some(meta.provider_id);
                state.is_local = Some(meta.is_local);
            });
        }
    }

    fn cancel(&self) {
        let cancelled = self.active().take();
        if let Some(generation) = cancelled {
            generation.cancelled.store(true, Ordering::Release);
            tracing::debug!(generation = %generation.id, "generation cancelled");
            self.state.send_modify(|state| state.is_streaming = false);
        }
    }
}

/// Accumulates the fragments of one generation at a time.
pub struct ClientSession<G> {
    gateway: G,
    channel: EventChannel,
    options: RwLock<SessionOptions>,
    shared: Arc<Shared>,
}

impl<G: Gateway> ClientSession<G> {
    /// Create a session. Must be called inside a Tokio runtime.
    pub fn new(gateway: G) -> Self {
        Self::with_options(gateway, SessionOptions::default())
    }

    pub fn with_options(gateway: G, options: SessionOptions) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());

        Self {
            gateway,
            channel: EventChannel::new(),
            options: RwLock::new(options),
            shared: Arc::new(Shared {
                state,
                active: Mutex::new(None),
                latest: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> SessionOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the settings used by the next generation.
    pub fn set_options(&self, options: SessionOptions) {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
    }

    /// Start a generation, superseding any active one.
    ///
    /// Returns as soon as the gateway has chosen a backend; fragments then
    /// accumulate in the session state.
    pub async fn generate(&self, prompt: impl Into<String>) -> Result<ProviderMeta, Error> {
        self.shared.cancel();

        let generation = GenerationId::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        *self.shared.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(generation);

        self.shared.state.send_modify(|state| {
            *state = SessionSnapshot {
                is_streaming: true,
                ..SessionSnapshot::default()
            };
        });

        // Listeners must exist before the gateway can emit anything
        let subscriptions = self.subscribe(generation, &cancelled);
        *self.shared.active() = Some(ActiveGeneration {
            id: generation,
            cancelled,
            _subscriptions: subscriptions,
        });

        let request = self.options().request(prompt);
        tracing::debug!(%generation, provider = ?request.provider, "requesting generation");

        match self
            .gateway
            .generate(request, self.channel.sender(generation))
            .await
        {
            Ok(meta) => {
                self.shared.record_meta(generation, meta);
                Ok(meta)
            }
            Err(e) => {
                self.shared.finish(generation, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Stop listening to the active generation. The backend is not interrupted.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Cancel and clear all output.
    pub fn reset(&self) {
        self.shared.cancel();
        *self.shared.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.shared.state.send_modify(|state| {
            state.output.clear();
            state.fragments = 0;
            state.error = None;
            state.provider_used = None;
            state.is_local = None;
        });
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state.subscribe()
    }

    /// Whether a generation is currently subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.shared.active().is_some()
    }

    /// Wait until no generation is streaming and return the final state.
    pub async fn wait_finished(&self) -> SessionSnapshot {
        let mut receiver = self.watch();
        let finished = match receiver.wait_for(|state| !state.is_streaming).await {
            Ok(state) => state.clone(),
            // The sender lives as long as `self`
            Err(_) => self.snapshot(),
        };
        finished
    }

    fn subscribe(&self, generation: GenerationId, cancelled: &Arc<AtomicBool>) -> Vec<Subscription> {
        let chunk_shared = Arc::clone(&self.shared);
        let chunk_cancelled = Arc::clone(cancelled);
        let on_chunk = self.channel.on_chunk(move |id, text| {
            if id != generation || chunk_cancelled.load(Ordering::Acquire) {
                return;
            }
            chunk_shared.update_current(generation, |state| {
                state.output.push_str(text);
                state.fragments += 1;
            });
        });

        let end_shared = Arc::clone(&self.shared);
        let on_end = self.channel.on_end(move |id| {
            if id == generation {
                end_shared.finish(generation, None);
            }
        });

        let error_shared = Arc::clone(&self.shared);
        let on_error = self.channel.on_error(move |id, message| {
            if id == generation {
                error_shared.finish(generation, Some(message.to_string()));
            }
        });

        vec![on_chunk, on_end, on_error]
    }
}

impl<G> std::fmt::Debug for ClientSession<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("state", &*self.shared.state.borrow())
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_to_request() {
        let options = SessionOptions {
            system_prompt: Some("Be brief".into()),
            temperature: Some(0.1),
            max_tokens: None,
            provider: Some(ProviderId::Anthropic),
            model: Some("claude-haiku-4-5-20251001".into()),
        };

        let request = options.request("Explain lifetimes");
        assert_eq!(request.prompt, "Explain lifetimes");
        assert_eq!(request.provider, Some(ProviderId::Anthropic));
        assert_eq!(request.options.system_prompt.as_deref(), Some("Be brief"));
        assert_eq!(request.options.model.as_deref(), Some("claude-haiku-4-5-20251001"));
        assert_eq!(request.options.max_tokens, None);
    }
}
