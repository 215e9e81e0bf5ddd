//! Streaming speech generation upstreams.
//!
//! The orchestrator talks to the generation service only through
//! [`SpeechUpstream`], so tests can substitute a scripted implementation and
//! the production build uses [`GeminiUpstream`].

mod error;
mod gemini;
mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::core::audio::AudioFragment;
use crate::core::synthesis::Candidate;

pub use error::UpstreamError;
pub use gemini::{DEFAULT_GEMINI_BASE_URL, GeminiUpstream, extract_error_message};
pub use sse::SseDecoder;

/// Incremental audio delivered by one upstream call, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<AudioFragment, UpstreamError>> + Send>>;

/// Optional generation parameters forwarded opaquely to the upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Free-form delivery instruction placed before the text.
    pub style: Option<String>,
    /// BCP-47 language code hint.
    pub language_code: Option<String>,
}

/// What to synthesize, independent of which candidate serves it.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub text: String,
    pub voice_id: String,
    pub options: GenerationOptions,
}

impl UpstreamRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// A streaming speech generation service.
#[async_trait]
pub trait SpeechUpstream: Send + Sync {
    /// Starts one generation call for `candidate`.
    ///
    /// Errors raised before the first fragment (HTTP status, connection) are
    /// returned directly; errors raised mid-body are yielded by the stream.
    async fn open_stream(
        &self,
        candidate: &Candidate,
        request: &UpstreamRequest,
    ) -> Result<FragmentStream, UpstreamError>;
}
