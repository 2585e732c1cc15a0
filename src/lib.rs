//! A streaming inference gateway.
//!
//! This library puts a local Ollama daemon and three cloud LLM vendors (OpenAI,
//! Anthropic, Google Gemini) behind one adapter contract, picks the backend for
//! each request (local first, then cloud in a fixed order), and relays the
//! generated text fragment by fragment to a consumer session.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod logging;
pub mod ndjson_stream;
pub mod provider;
pub mod providers;
pub mod response;
pub mod router;
pub mod session;
pub mod sse_stream;
pub mod types;

// Re-export core types for easy usage
pub use bridge::{Bridge, Gateway, RelayOutcome};
pub use channel::{EventChannel, EventSender, Subscription};
pub use config::{GatewayConfig, ProbeTimeouts};
pub use credentials::{CredentialStore, EnvCredentialStore, MemoryCredentialStore};
pub use error::Error;
pub use factory::ProviderFactory;
pub use provider::ProviderAdapter;
pub use providers::*;
pub use response::*;
pub use router::{Router, RouterResult};
pub use session::{ClientSession, SessionOptions, SessionSnapshot};
pub use sse_stream::SseEvent;
pub use types::*;
