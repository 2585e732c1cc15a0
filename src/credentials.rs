//! Where cloud API keys come from.
//!
//! The router only ever reads keys; writing them is the settings layer's job.
//! An empty key counts as no key.

use std::collections::HashMap;
use std::env;
use std::sync::{PoisonError, RwLock};

use crate::ProviderId;

/// Read-only source of API keys, consulted on every routing decision.
pub trait CredentialStore: Send + Sync {
    /// The key stored for `provider`, if any.
    fn get(&self, provider: ProviderId) -> Option<String>;

    /// Whether a non-empty key is stored for `provider`.
    fn has(&self, provider: ProviderId) -> bool {
        self.get(provider).is_some_and(|key| !key.is_empty())
    }
}

/// Credential store that reads from environment variables.
///
/// Each provider maps to a list of variables tried in order; the first
/// non-empty one wins.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore {
    mappings: HashMap<ProviderId, Vec<String>>,
}

impl EnvCredentialStore {
    /// A store with no mappings. See [`EnvCredentialStore::with_defaults`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping<I, V>(mut self, provider: ProviderId, vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.mappings
            .insert(provider, vars.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_defaults(self) -> Self {
        self.with_mapping(ProviderId::OpenAI, ["OPENAI_API_KEY"])
            .with_mapping(ProviderId::Anthropic, ["ANTHROPIC_API_KEY"])
            .with_mapping(ProviderId::Google, ["GOOGLE_API_KEY", "GEMINI_API_KEY"])
    }
}

impl CredentialStore for EnvCredentialStore {
    fn get(&self, provider: ProviderId) -> Option<String> {
        self.mappings
            .get(&provider)?
            .iter()
            .filter_map(|var| env::var(var).ok())
            .find(|key| !key.is_empty())
    }
}

/// In-memory credential store. Keys may be changed between calls.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    keys: RwLock<HashMap<ProviderId, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(self, provider: ProviderId, key: impl Into<String>) -> Self {
        self.set(provider, key);
        self
    }

    pub fn set(&self, provider: ProviderId, key: impl Into<String>) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider, key.into());
    }

    pub fn remove(&self, provider: ProviderId) -> Option<String> {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&provider)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, provider: ProviderId) -> Option<String> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .cloned()
    }
}
