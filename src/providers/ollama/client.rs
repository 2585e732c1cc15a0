use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;

use super::types::*;
use crate::config::ProbeTimeouts;
use crate::ndjson_stream::NdjsonStreamExt;
use crate::provider::ProviderAdapter;
use crate::{Completion, CompletionOptions, Error, ProviderId};

pub const DEFAULT_MODEL: &str = "llama3.2";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Adapter for the local Ollama daemon.
///
/// The base URL is fixed at construction; the router keeps a single instance for
/// the whole process.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    timeouts: ProbeTimeouts,
}

impl OllamaProvider {
    /// Create a provider for the daemon at `base_url` with the default timeouts.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeouts(base_url, ProbeTimeouts::default())
    }

    pub fn with_timeouts(base_url: impl Into<String>, timeouts: ProbeTimeouts) -> Result<Self, Error> {
        // No overall timeout: a generation runs until the daemon ends it
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            timeouts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn build_request(prompt: &str, options: &CompletionOptions) -> OllamaGenerateRequest {
        OllamaGenerateRequest {
            model: options.model_or(DEFAULT_MODEL).to_string(),
            prompt: prompt.to_string(),
            stream: true,
            system: options.system_prompt().map(str::to_string),
            options: options.temperature.map(|temperature| OllamaOptions {
                temperature: Some(temperature),
            }),
        }
    }

    /// Turn one NDJSON line into a fragment. Lines that do not parse are skipped.
    fn parse_line(line: &str) -> Option<Result<String, Error>> {
        match serde_json::from_str::<OllamaGenerateChunk>(line) {
            Ok(OllamaGenerateChunk {
                error: Some(message),
                ..
            }) => Some(Err(Error::provider("Ollama", message))),
            Ok(chunk) => chunk.response.filter(|text| !text.is_empty()).map(Ok),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed line from daemon");
                None
            }
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>, Error> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(self.timeouts.list)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::status("Ollama", response.status().as_u16()));
        }

        let body = response.text().await?;
        let tags: OllamaTagsResponse = serde_json::from_str(&body)?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OllamaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    async fn probe(&self) -> bool {
        match self
            .client
            .get(self.tags_url())
            .timeout(self.timeouts.probe)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, endpoint = %self.base_url, "local daemon probe failed");
                false
            }
        }
    }

    async fn list_models(&self) -> Vec<String> {
        self.fetch_models().await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "could not list local models");
            Vec::new()
        })
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, Error> {
        let request = Self::build_request(prompt, options);

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::LocalUnavailable
                } else {
                    Error::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::status("Ollama", response.status().as_u16()));
        }

        let fragments = Box::pin(response.bytes_stream())
            .ndjson_lines()
            .filter_map(|line| async move {
                match line {
                    Ok(line) => Self::parse_line(&line),
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Completion::from_stream(fragments))
    }
}
