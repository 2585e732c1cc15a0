use thiserror::Error;

use crate::types::ProviderId;

/// Errors that can occur when routing or streaming a generation.
///
/// Every variant renders as a short sentence that can be shown to the user as-is.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not reach {vendor}. Check your network connection.")]
    Unreachable { vendor: String },

    #[error("Invalid {vendor} API key. Check your settings.")]
    Auth { vendor: String },

    #[error("{vendor} rate limit exceeded. Try again later.")]
    RateLimit { vendor: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("{provider} returned status {status}")]
    Status { provider: String, status: u16 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Ollama is not running. Start it with: ollama serve")]
    LocalUnavailable,

    #[error("Provider \"{0}\" is not available. Check your API key in settings.")]
    ProviderUnavailable(ProviderId),

    #[error("No AI provider available. Install Ollama for local AI or add an API key in settings.")]
    NoProviderAvailable,
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn auth(vendor: impl Into<String>) -> Self {
        Error::Auth {
            vendor: vendor.into(),
        }
    }

    pub fn rate_limit(vendor: impl Into<String>) -> Self {
        Error::RateLimit {
            vendor: vendor.into(),
        }
    }

    /// Classify a failed request to `vendor`. Connection and timeout
    /// failures become [`Error::Unreachable`]; anything else stays `Http`.
    pub fn transport(vendor: impl Into<String>, error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            tracing::debug!(error = %error, "vendor unreachable");
            Error::Unreachable {
                vendor: vendor.into(),
            }
        } else {
            Error::Http(error)
        }
    }

    pub fn status(provider: impl Into<String>, status: u16) -> Self {
        Error::Status {
            provider: provider.into(),
            status,
        }
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    /// Whether this error means "no backend could serve the request" rather
    /// than a failure of a backend that was reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::LocalUnavailable | Error::ProviderUnavailable(_) | Error::NoProviderAvailable
        )
    }
}
