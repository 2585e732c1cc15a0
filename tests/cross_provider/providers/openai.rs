use super::{sse_body, sse_response, ProviderConfig, ProviderTestSetup};
use platformed_gateway::{OpenAIProvider, ProviderAdapter, ProviderId};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OpenAITestSetup;

#[async_trait::async_trait]
impl ProviderTestSetup for OpenAITestSetup {
    fn get_config() -> ProviderConfig {
        ProviderConfig {
            name: "OpenAI",
            id: ProviderId::OpenAI,
            vendor: "OpenAI",
        }
    }

    fn create_provider(base_url: &str) -> Arc<dyn ProviderAdapter> {
        let provider =
            OpenAIProvider::new_with_base_url("test-api-key".to_string(), base_url.to_string())
                .expect("Failed to create OpenAI provider");
        Arc::new(provider)
    }

    async fn mount_streaming_mocks(mock_server: &MockServer, fragments: &[&str]) {
        let role = json!({"id": "chatcmpl-1", "object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}]});
        let stop = json!({"id": "chatcmpl-1", "object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]});

        let events = std::iter::once((None, role.to_string()))
            .chain(fragments.iter().map(|text| {
                let chunk = json!({"id": "chatcmpl-1", "object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]});
                (None, chunk.to_string())
            }))
            .chain([(None, stop.to_string()), (None, "[DONE]".to_string())]);

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .respond_with(sse_response(sse_body(events)))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_error_mock(mock_server: &MockServer, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(mock_server)
            .await;
    }

    fn auth_error() -> (u16, Value) {
        (
            401,
            json!({"error": {"message": "Incorrect API key provided: test-api-key.", "type": "invalid_request_error", "code": "invalid_api_key"}}),
        )
    }

    fn rate_limit_error() -> (u16, Value) {
        (
            429,
            json!({"error": {"message": "Rate limit reached for gpt-4o-mini.", "type": "requests", "code": "rate_limit_exceeded"}}),
        )
    }
}
