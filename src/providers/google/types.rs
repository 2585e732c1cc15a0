use serde::{Deserialize, Serialize};

/// Gemini `streamGenerateContent` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    pub contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GoogleGenerationConfig>,
}

/// Google content (message) format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>, // "user", "model"
    #[serde(default)]
    pub parts: Vec<GooglePart>,
}

impl GoogleContent {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![GooglePart::text(text)],
        }
    }

    /// System instructions carry no role.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![GooglePart::text(text)],
        }
    }
}

/// Part of a Google content. Non-text parts deserialize with `text: None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GooglePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl GooglePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// Google generation configuration.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GoogleGenerationConfig {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}

/// One SSE payload of a streamed response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleStreamChunk {
    #[serde(default)]
    pub candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    pub error: Option<GoogleErrorDetails>,
}

impl GoogleStreamChunk {
    /// Concatenated text of the first candidate's parts.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Google response candidate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCandidate {
    #[serde(default)]
    pub content: Option<GoogleContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// `{"error": {...}}` body returned on failure.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorDetails {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>, // "INVALID_ARGUMENT", "RESOURCE_EXHAUSTED", ...
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

impl GoogleErrorDetails {
    /// Whether the message, status or any detail mentions `marker`.
    pub fn mentions(&self, marker: &str) -> bool {
        self.message.contains(marker)
            || self.status.as_deref() == Some(marker)
            || self
                .details
                .iter()
                .any(|detail| detail.to_string().contains(marker))
    }
}
