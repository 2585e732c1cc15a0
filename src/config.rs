//! Gateway configuration.

use crate::{Error, ProviderId};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Timeouts applied to the local daemon's bounded checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTimeouts {
    /// Health check used by `probe`.
    pub probe: Duration,
    /// Model listing.
    pub list: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(3),
            list: Duration::from_secs(5),
        }
    }
}

/// Everything the router needs to build adapters.
///
/// Provider preference and per-provider model choice are settings of the
/// consumer and are passed per request, not stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the local daemon, fixed for the lifetime of the router.
    pub ollama_endpoint: String,
    pub timeouts: ProbeTimeouts,
    /// Base URL overrides (proxies, tests). `None` uses the vendor default.
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub google_base_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ollama_endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            timeouts: ProbeTimeouts::default(),
            openai_base_url: None,
            anthropic_base_url: None,
            google_base_url: None,
        }
    }
}

impl GatewayConfig {
    pub fn with_ollama_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.ollama_endpoint = endpoint.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: ProbeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Point one cloud provider at a different base URL.
    pub fn with_base_url(mut self, provider: ProviderId, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        match provider {
            ProviderId::Ollama => self.ollama_endpoint = base_url,
            ProviderId::OpenAI => self.openai_base_url = Some(base_url),
            ProviderId::Anthropic => self.anthropic_base_url = Some(base_url),
            ProviderId::Google => self.google_base_url = Some(base_url),
        }
        self
    }

    /// The configured base URL: always set for the daemon, an override for cloud providers.
    pub fn base_url(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::Ollama => Some(&self.ollama_endpoint),
            ProviderId::OpenAI => self.openai_base_url.as_deref(),
            ProviderId::Anthropic => self.anthropic_base_url.as_deref(),
            ProviderId::Google => self.google_base_url.as_deref(),
        }
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Ok(host) = env::var("OLLAMA_HOST") {
            config.ollama_endpoint = normalize_ollama_host(&host);
        }
        if let Some(probe) = duration_ms_from_env("GATEWAY_PROBE_TIMEOUT_MS")? {
            config.timeouts.probe = probe;
        }
        if let Some(list) = duration_ms_from_env("GATEWAY_LIST_TIMEOUT_MS")? {
            config.timeouts.list = list;
        }

        config.openai_base_url = env::var("OPENAI_BASE_URL").ok();
        config.anthropic_base_url = env::var("ANTHROPIC_BASE_URL").ok();
        config.google_base_url = env::var("GOOGLE_BASE_URL").ok();

        Ok(config)
    }
}

/// `OLLAMA_HOST` is commonly given without a scheme (`127.0.0.1:11434`).
fn normalize_ollama_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn duration_ms_from_env(var: &str) -> Result<Option<Duration>, Error> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| Error::config(format!("{var} must be a number of milliseconds, got '{value}'"))),
        Err(_) => Ok(None),
    }
}
