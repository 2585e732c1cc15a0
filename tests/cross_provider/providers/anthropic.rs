use super::{sse_body, sse_response, ProviderConfig, ProviderTestSetup};
use platformed_gateway::{AnthropicProvider, ProviderAdapter, ProviderId};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct AnthropicTestSetup;

#[async_trait::async_trait]
impl ProviderTestSetup for AnthropicTestSetup {
    fn get_config() -> ProviderConfig {
        ProviderConfig {
            name: "Anthropic",
            id: ProviderId::Anthropic,
            vendor: "Anthropic",
        }
    }

    fn create_provider(base_url: &str) -> Arc<dyn ProviderAdapter> {
        let provider =
            AnthropicProvider::new_with_base_url("test-api-key".to_string(), base_url.to_string())
                .expect("Failed to create Anthropic provider");
        Arc::new(provider)
    }

    async fn mount_streaming_mocks(mock_server: &MockServer, fragments: &[&str]) {
        let mut events = vec![
            (
                Some("message_start"),
                json!({"type": "message_start", "message": {"id": "msg_1", "type": "message", "role": "assistant", "content": [], "model": "claude-sonnet-4-20250514", "usage": {"input_tokens": 12, "output_tokens": 1}}}).to_string(),
            ),
            (
                Some("content_block_start"),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}).to_string(),
            ),
            (Some("ping"), json!({"type": "ping"}).to_string()),
        ];
        events.extend(fragments.iter().map(|text| {
            (
                Some("content_block_delta"),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}}).to_string(),
            )
        }));
        events.extend([
            (
                Some("content_block_stop"),
                json!({"type": "content_block_stop", "index": 0}).to_string(),
            ),
            (
                Some("message_delta"),
                json!({"type": "message_delta", "delta": {"stop_reason": "end_turn", "stop_sequence": null}, "usage": {"output_tokens": 5}}).to_string(),
            ),
            (
                Some("message_stop"),
                json!({"type": "message_stop"}).to_string(),
            ),
        ]);

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(sse_response(sse_body(events)))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_error_mock(mock_server: &MockServer, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(mock_server)
            .await;
    }

    fn auth_error() -> (u16, Value) {
        (
            401,
            json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}),
        )
    }

    fn rate_limit_error() -> (u16, Value) {
        (
            429,
            json!({"type": "error", "error": {"type": "rate_limit_error", "message": "Number of request tokens has exceeded your per-minute rate limit"}}),
        )
    }
}
