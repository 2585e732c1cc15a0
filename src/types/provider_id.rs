use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The closed set of backends the gateway knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// The local Ollama daemon.
    Ollama,
    OpenAI,
    Anthropic,
    Google,
}

impl ProviderId {
    /// Cloud providers in the order the router falls back through them.
    pub const CLOUD_PRIORITY: [ProviderId; 3] =
        [ProviderId::OpenAI, ProviderId::Anthropic, ProviderId::Google];

    /// Every provider, local first.
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Ollama,
        ProviderId::OpenAI,
        ProviderId::Anthropic,
        ProviderId::Google,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Ollama => "ollama",
            ProviderId::OpenAI => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Google => "google",
        }
    }

    /// Only the local daemon keeps prompts on this machine.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderId::Ollama)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Ollama => "Ollama (Local)",
            ProviderId::OpenAI => "OpenAI",
            ProviderId::Anthropic => "Anthropic",
            ProviderId::Google => "Google Gemini",
        }
    }

    /// Name used in user-facing error sentences.
    pub fn vendor_name(&self) -> &'static str {
        match self {
            ProviderId::Ollama => "Ollama",
            ProviderId::OpenAI => "OpenAI",
            ProviderId::Anthropic => "Anthropic",
            ProviderId::Google => "Google AI",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| {
                Error::config(format!(
                    "Unknown provider '{s}'. Valid values are: ollama, openai, anthropic, google"
                ))
            })
    }
}
