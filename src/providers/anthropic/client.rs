use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::types::*;
use crate::provider::ProviderAdapter;
use crate::sse_stream::SseStreamExt;
use crate::{Completion, CompletionOptions, Error, ProviderId};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// The Messages API requires `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const API_VERSION: &str = "2023-06-01";

pub const MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-haiku-4-5-20251001",
    "claude-opus-4-20250514",
];

const VENDOR: &str = "Anthropic";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Anthropic Claude provider implementation.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: String) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a new Anthropic provider with custom base URL (for testing).
    pub fn new_with_base_url(api_key: String, base_url: String) -> Result<Self, Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn convert_request(prompt: &str, options: &CompletionOptions) -> AnthropicRequest {
        AnthropicRequest {
            model: options.model_or(DEFAULT_MODEL).to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            // Anthropic takes the system prompt as a separate field
            system: options.system_prompt().map(str::to_string),
            temperature: options.temperature,
            stream: true,
        }
    }

    fn normalize_error(status: Option<StatusCode>, details: Option<&AnthropicErrorDetails>) -> Error {
        let kind = details.map(|d| d.r#type.as_str());

        if status == Some(StatusCode::UNAUTHORIZED) || kind == Some("authentication_error") {
            return Error::auth(VENDOR);
        }
        if status == Some(StatusCode::TOO_MANY_REQUESTS) || kind == Some("rate_limit_error") {
            return Error::rate_limit(VENDOR);
        }

        match (details, status) {
            (Some(details), _) => Error::provider(VENDOR, details.message.clone()),
            (None, Some(status)) => Error::provider(VENDOR, format!("API error: {status}")),
            (None, None) => Error::provider(VENDOR, "unknown streaming error"),
        }
    }

    /// Extract text from one stream event. Everything but text is dropped.
    fn convert_stream_event(event: AnthropicStreamEvent) -> Result<Option<String>, Error> {
        let text = match event {
            AnthropicStreamEvent::ContentBlockDelta {
                delta: AnthropicContentDelta::TextDelta { text },
                ..
            } => text,
            AnthropicStreamEvent::Error { error } => {
                return Err(Self::normalize_error(None, Some(&error)));
            }
            // Block starts, tool input, message bookkeeping and keep-alives carry no text
            _ => return Ok(None),
        };

        Ok(Some(text).filter(|text| !text.is_empty()))
    }

    fn convert_event(data: &str) -> Result<Option<String>, Error> {
        let data = data.trim();
        if data.is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(event) => Self::convert_stream_event(event),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unrecognized Anthropic event");
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn probe(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn list_models(&self) -> Vec<String> {
        MODELS.iter().map(|model| model.to_string()).collect()
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, Error> {
        let request = Self::convert_request(prompt, options);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::transport(VENDOR, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let details = serde_json::from_str::<AnthropicErrorResponse>(&error_text)
                .ok()
                .map(|e| e.error);
            return Err(Self::normalize_error(Some(status), details.as_ref()));
        }

        let fragments = Box::pin(response.bytes_stream())
            .sse_events()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => Self::convert_event(&event.data).transpose(),
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Completion::from_stream(fragments))
    }
}
