//! Provider implementations: the local daemon and the three cloud vendors.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

// Re-export commonly used provider types
pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
