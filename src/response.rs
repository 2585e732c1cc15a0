//! The lazy fragment sequence produced by a generation.

use crate::Error;
use futures_util::stream::Stream;
use std::pin::Pin;

/// Boxed stream of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// The output of one generation: a finite, one-shot stream of text fragments in
/// the order the backend produced them.
pub struct Completion {
    stream: FragmentStream,
}

impl Completion {
    /// Create a completion from a stream of fragments.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String, Error>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Stream the fragments.
    pub fn into_stream(self) -> FragmentStream {
        self.stream
    }

    /// Buffer the whole generation into one string, failing on the first error.
    pub async fn text(self) -> Result<String, Error> {
        use futures_util::StreamExt;

        let mut stream = self.stream;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}
