//! Events pushed from the producer side of a generation to its consumer.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one generation request. Every message on a consumer channel carries one,
/// so events of a superseded generation can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(Uuid);

impl GenerationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A single event of a generation stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// One fragment of generated text.
    Chunk { text: String },
    /// The stream finished normally.
    End,
    /// The stream failed; nothing follows.
    Error { message: String },
}

impl StreamEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamEvent::Chunk { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// `End` and `Error` close a generation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End | StreamEvent::Error { .. })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Chunk { .. } => EventKind::Chunk,
            StreamEvent::End => EventKind::End,
            StreamEvent::Error { .. } => EventKind::Error,
        }
    }
}

/// The three event kinds a consumer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Chunk,
    End,
    Error,
}

/// What actually travels over a consumer channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub generation: GenerationId,
    pub event: StreamEvent,
}
