#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use platformed_gateway::{
    Bridge, EventSender, Error, GatewayConfig, GenerateRequest, Gateway, MemoryCredentialStore,
    ProviderId, ProviderMeta, Router,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nothing listens here, so connecting fails immediately.
pub const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:1";

/// An NDJSON generate stream as the daemon writes it.
pub fn ndjson_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for text in fragments {
        let line = json!({"model": "llama3.2", "created_at": "2024-01-01T00:00:00Z", "response": text, "done": false});
        body.push_str(&line.to_string());
        body.push('\n');
    }
    let last = json!({"model": "llama3.2", "created_at": "2024-01-01T00:00:01Z", "response": "", "done": true, "done_reason": "stop", "eval_count": fragments.len()});
    body.push_str(&last.to_string());
    body.push('\n');
    body
}

pub async fn mount_tags(server: &MockServer, models: &[&str]) {
    let models: Vec<_> = models
        .iter()
        .map(|name| json!({"name": name, "model": name, "size": 2019393189u64}))
        .collect();

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": models})))
        .mount(server)
        .await;
}

pub async fn mount_generate(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-ndjson")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// A running daemon that answers every prompt with `fragments`.
pub async fn running_daemon(fragments: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    mount_tags(&server, &["llama3.2:latest"]).await;
    mount_generate(&server, ndjson_body(fragments)).await;
    server
}

pub fn config_for(endpoint: &str) -> GatewayConfig {
    GatewayConfig::default().with_ollama_endpoint(endpoint)
}

pub fn router(config: GatewayConfig, store: MemoryCredentialStore) -> Arc<Router> {
    Arc::new(Router::new(config, Arc::new(store)).expect("router should build"))
}

pub fn bridge(config: GatewayConfig, store: MemoryCredentialStore) -> Bridge {
    Bridge::new(router(config, store))
}

/// Gateway that hands every [`EventSender`] to the test instead of streaming.
#[derive(Clone)]
pub struct ScriptedGateway {
    pub senders: Arc<Mutex<Vec<EventSender>>>,
    pub requests: Arc<Mutex<Vec<GenerateRequest>>>,
    pub provider: ProviderId,
    pub fail: bool,
}

impl ScriptedGateway {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            senders: Arc::default(),
            requests: Arc::default(),
            provider,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(ProviderId::Ollama)
        }
    }

    pub fn sender(&self, index: usize) -> EventSender {
        self.senders.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl Gateway for ScriptedGateway {
    async fn generate(
        &self,
        request: GenerateRequest,
        events: EventSender,
    ) -> Result<ProviderMeta, Error> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(Error::NoProviderAvailable);
        }
        self.senders.lock().unwrap().push(events);
        Ok(ProviderMeta::for_provider(self.provider))
    }
}

/// Give the channel pump a moment to deliver anything already queued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
