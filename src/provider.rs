use crate::{CompletionOptions, Completion, Error, ProviderId};

/// A backend that can serve generations.
///
/// Implementations are selected by [`ProviderId`], never by inspecting their type.
/// `probe` and `list_models` must not fail: an unreachable backend is reported as
/// unavailable or as having no models.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// Which backend this adapter talks to.
    fn id(&self) -> ProviderId;

    /// Whether prompts stay on this machine.
    fn is_local(&self) -> bool {
        self.id().is_local()
    }

    /// Bounded-time availability check.
    async fn probe(&self) -> bool;

    /// Model identifiers this backend can serve.
    async fn list_models(&self) -> Vec<String>;

    /// Start a generation. Fragments arrive through the returned [`Completion`].
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, Error>;
}
