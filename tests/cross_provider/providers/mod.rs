pub mod anthropic;
pub mod google;
pub mod openai;

use std::sync::Arc;

use platformed_gateway::{ProviderAdapter, ProviderId};
use serde_json::Value;
use wiremock::{MockServer, ResponseTemplate};

/// Provider configuration for cross-provider testing
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: &'static str,
    pub id: ProviderId,
    /// Vendor name as it appears in normalized error messages.
    pub vendor: &'static str,
}

/// Trait for provider-specific test setup
#[async_trait::async_trait]
pub trait ProviderTestSetup {
    /// Get the provider configuration
    fn get_config() -> ProviderConfig;

    /// Create the provider instance
    fn create_provider(base_url: &str) -> Arc<dyn ProviderAdapter>;

    /// Mount a successful stream producing `fragments` in order
    async fn mount_streaming_mocks(mock_server: &MockServer, fragments: &[&str]);

    /// Mount a failed request answered with `status` and `body`
    async fn mount_error_mock(mock_server: &MockServer, status: u16, body: Value);

    /// Vendor error body for a rejected API key, with its HTTP status
    fn auth_error() -> (u16, Value);

    /// Vendor error body for an exhausted quota, with its HTTP status
    fn rate_limit_error() -> (u16, Value);
}

/// Frame `(event name, JSON payload)` pairs as an SSE body.
pub fn sse_body<'a>(events: impl IntoIterator<Item = (Option<&'a str>, String)>) -> String {
    events
        .into_iter()
        .map(|(name, data)| match name {
            Some(name) => format!("event: {name}\ndata: {data}\n\n"),
            None => format!("data: {data}\n\n"),
        })
        .collect()
}

pub fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}
