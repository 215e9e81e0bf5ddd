use crate::core::audio::AudioError;
use crate::core::upstream::UpstreamError;

/// Terminal failures of one synthesis run.
///
/// Per-attempt upstream failures never appear here directly; they are absorbed
/// by the retry/failover loop and only surface as the `last_failure` of
/// [`SynthesisError::AllCandidatesExhausted`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("All candidates exhausted after {attempts} attempts: {}", .last_failure.as_deref().unwrap_or("no audio produced"))]
    AllCandidatesExhausted {
        attempts: u32,
        last_failure: Option<String>,
    },

    /// Audio was generated but could not be wrapped in a container.
    #[error("Container build failed: {0}")]
    ContainerBuild(String),

    /// Audio was generated but could not be re-encoded.
    #[error("Transcode failed: {0}")]
    Transcode(String),
}

impl SynthesisError {
    /// Short machine readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::AllCandidatesExhausted { .. } => "all_candidates_exhausted",
            Self::ContainerBuild(_) => "container_build",
            Self::Transcode(_) => "transcode",
        }
    }

    pub(crate) fn exhausted(attempts: u32, last_failure: Option<&UpstreamError>) -> Self {
        Self::AllCandidatesExhausted {
            attempts,
            last_failure: last_failure.map(ToString::to_string),
        }
    }
}

impl From<AudioError> for SynthesisError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::ContainerBuild(msg) => Self::ContainerBuild(msg),
            AudioError::Transcode(msg) => Self::Transcode(msg),
        }
    }
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;
