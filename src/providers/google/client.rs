use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::types::*;
use crate::provider::ProviderAdapter;
use crate::sse_stream::SseStreamExt;
use crate::{Completion, CompletionOptions, Error, ProviderId};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub const MODELS: &[&str] = &["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"];

const VENDOR: &str = "Google AI";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const AUTH_MARKERS: &[&str] = &["API_KEY_INVALID", "PERMISSION_DENIED"];
const RATE_LIMIT_MARKER: &str = "RESOURCE_EXHAUSTED";

/// Google Gemini provider implementation (Generative Language API).
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleProvider {
    /// Create a new Google provider.
    pub fn new(api_key: String) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a new Google provider with custom base URL (for testing).
    pub fn new_with_base_url(api_key: String, base_url: String) -> Result<Self, Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    fn convert_request(prompt: &str, options: &CompletionOptions) -> GoogleRequest {
        let generation_config = GoogleGenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
        };

        GoogleRequest {
            contents: vec![GoogleContent::user(prompt)],
            system_instruction: options.system_prompt().map(GoogleContent::instruction),
            generation_config: Some(generation_config).filter(|config| !config.is_empty()),
        }
    }

    fn normalize_error(status: Option<StatusCode>, details: Option<&GoogleErrorDetails>) -> Error {
        let mentions = |marker: &str| details.is_some_and(|d| d.mentions(marker));

        if matches!(status, Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN))
            || AUTH_MARKERS.iter().any(|marker| mentions(marker))
        {
            return Error::auth(VENDOR);
        }
        if status == Some(StatusCode::TOO_MANY_REQUESTS) || mentions(RATE_LIMIT_MARKER) {
            return Error::rate_limit(VENDOR);
        }

        match (details, status) {
            (Some(details), _) if !details.message.is_empty() => {
                Error::provider(VENDOR, details.message.clone())
            }
            (_, Some(status)) => Error::provider(VENDOR, format!("API error: {status}")),
            _ => Error::provider(VENDOR, "unknown streaming error"),
        }
    }

    fn convert_event(data: &str) -> Result<Option<String>, Error> {
        let data = data.trim();
        if data.is_empty() {
            return Ok(None);
        }

        let chunk = match serde_json::from_str::<GoogleStreamChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed Gemini event");
                return Ok(None);
            }
        };

        if let Some(error) = &chunk.error {
            return Err(Self::normalize_error(None, Some(error)));
        }

        let text = chunk.text();
        Ok(Some(text).filter(|text| !text.is_empty()))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GoogleProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Google
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
        let model = options.model_or(DEFAULT_MODEL);

        let response = self
            .client
            .post(self.stream_url(model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::transport(VENDOR, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let details = serde_json::from_str::<GoogleErrorResponse>(&error_text)
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
