use super::{sse_body, sse_response, ProviderConfig, ProviderTestSetup};
use platformed_gateway::{GoogleProvider, ProviderAdapter, ProviderId};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct GoogleTestSetup;

const STREAM_PATH: &str = "/v1beta/models/gemini-2.0-flash:streamGenerateContent";

#[async_trait::async_trait]
impl ProviderTestSetup for GoogleTestSetup {
    fn get_config() -> ProviderConfig {
        ProviderConfig {
            name: "Google",
            id: ProviderId::Google,
            vendor: "Google AI",
        }
    }

    fn create_provider(base_url: &str) -> Arc<dyn ProviderAdapter> {
        let provider =
            GoogleProvider::new_with_base_url("test-api-key".to_string(), base_url.to_string())
                .expect("Failed to create Google provider");
        Arc::new(provider)
    }

    async fn mount_streaming_mocks(mock_server: &MockServer, fragments: &[&str]) {
        let last = fragments.len().saturating_sub(1);
        let events = fragments.iter().enumerate().map(|(i, text)| {
            let mut candidate = json!({"content": {"role": "model", "parts": [{"text": text}]}, "index": 0});
            if i == last {
                candidate["finishReason"] = json!("STOP");
            }
            (None, json!({"candidates": [candidate], "modelVersion": "gemini-2.0-flash"}).to_string())
        });

        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .and(query_param("alt", "sse"))
            .and(header("x-goog-api-key", "test-api-key"))
            .respond_with(sse_response(sse_body(events)))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_error_mock(mock_server: &MockServer, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(mock_server)
            .await;
    }

    fn auth_error() -> (u16, Value) {
        (
            400,
            json!({"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT", "details": [{"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID", "domain": "googleapis.com"}]}}),
        )
    }

    fn rate_limit_error() -> (u16, Value) {
        (
            429,
            json!({"error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}}),
        )
    }
}
