use futures_util::{future, StreamExt};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::types::*;
use crate::provider::ProviderAdapter;
use crate::sse_stream::SseStreamExt;
use crate::{Completion, CompletionOptions, Error, ProviderId};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful developer assistant.";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Models offered for selection.
pub const MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"];

const VENDOR: &str = "OpenAI";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI provider implementation.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new(api_key: String) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a new OpenAI provider with custom base URL.
    pub fn new_with_base_url(api_key: String, base_url: String) -> Result<Self, Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the chat request: a system turn followed by the prompt as the only user turn.
    fn convert_request(prompt: &str, options: &CompletionOptions) -> ChatCompletionRequest {
        let system = options.system_prompt().unwrap_or(DEFAULT_SYSTEM_PROMPT);

        ChatCompletionRequest {
            model: options.model_or(DEFAULT_MODEL).to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options.max_tokens,
            stream: true,
        }
    }

    /// Map an error (from the HTTP status or an in-stream error object) to a user-facing error.
    fn normalize_error(status: Option<StatusCode>, details: Option<&ErrorDetails>) -> Error {
        let code = details.and_then(|d| d.code.as_deref().or(d.r#type.as_deref()));

        if status == Some(StatusCode::UNAUTHORIZED) || code == Some("invalid_api_key") {
            return Error::auth(VENDOR);
        }
        if status == Some(StatusCode::TOO_MANY_REQUESTS) || code == Some("rate_limit_exceeded") {
            return Error::rate_limit(VENDOR);
        }

        match (details, status) {
            (Some(details), _) => Error::provider(VENDOR, details.message.clone()),
            (None, Some(status)) => Error::provider(VENDOR, format!("API error: {status}")),
            (None, None) => Error::provider(VENDOR, "unknown streaming error"),
        }
    }

    /// Extract the text delta from one SSE payload.
    fn convert_event(data: &str) -> Result<Option<String>, Error> {
        let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                // Skip unparseable events (comments, keep-alives)
                tracing::debug!(error = %e, "skipping unparseable OpenAI event");
                return Ok(None);
            }
        };

        if let Some(details) = chunk.error.as_ref() {
            return Err(Self::normalize_error(None, Some(details)));
        }

        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty()))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAIProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAI
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
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::transport(VENDOR, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let details = serde_json::from_str::<OpenAIError>(&error_text)
                .ok()
                .map(|e| e.error);
            return Err(Self::normalize_error(Some(status), details.as_ref()));
        }

        let fragments = Box::pin(response.bytes_stream())
            .sse_events()
            .take_while(|event| future::ready(!matches!(event, Ok(event) if event.is_done())))
            .filter_map(|event| async move {
                match event {
                    Ok(event) => Self::convert_event(&event.data).transpose(),
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Completion::from_stream(fragments))
    }
}
