use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::SynthesisError;
use crate::core::audio::SampleFormat;
use crate::core::upstream::{GenerationOptions, UpstreamError, UpstreamRequest};

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Last four characters, for logs.
    pub fn hint(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("...{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.hint())
    }
}

/// One (model, credential) option the orchestrator may attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Nickname the caller selected (reported back in the response).
    pub nickname: String,
    /// Concrete upstream model identifier.
    pub model_id: String,
    pub credential: Credential,
}

impl Candidate {
    pub fn new(
        nickname: impl Into<String>,
        model_id: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            model_id: model_id.into(),
            credential,
        }
    }
}

/// Shape of the audio handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Uncompressed WAV container.
    #[serde(rename = "wav")]
    RawContainer,
    /// Compressed MP3.
    #[default]
    #[serde(rename = "mp3")]
    Compressed,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawContainer => "wav",
            Self::Compressed => "mp3",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" | "raw" | "raw_container" => Ok(Self::RawContainer),
            "mp3" | "compressed" => Ok(Self::Compressed),
            other => Err(format!("Unknown output format '{other}', expected wav or mp3")),
        }
    }
}

/// Everything one orchestration run needs. Fields are read-only after construction.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    input: UpstreamRequest,
    candidates: Vec<Candidate>,
    max_attempts_per_candidate: u32,
    output_format: OutputFormat,
}

impl SynthesisRequest {
    /// Validates and freezes a request.
    ///
    /// # Errors
    /// `SynthesisError::InvalidRequest` for blank text, an empty candidate list
    /// or a zero attempt ceiling.
    pub fn new(
        input: UpstreamRequest,
        candidates: Vec<Candidate>,
        max_attempts_per_candidate: u32,
        output_format: OutputFormat,
    ) -> Result<Self, SynthesisError> {
        if input.text.trim().is_empty() {
            return Err(SynthesisError::InvalidRequest(
                "text must not be empty".to_string(),
            ));
        }
        if candidates.is_empty() {
            return Err(SynthesisError::InvalidRequest(
                "at least one candidate is required".to_string(),
            ));
        }
        if max_attempts_per_candidate == 0 {
            return Err(SynthesisError::InvalidRequest(
                "max attempts per candidate must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            input,
            candidates,
            max_attempts_per_candidate,
            output_format,
        })
    }

    pub fn text(&self) -> &str {
        &self.input.text
    }

    pub fn voice_id(&self) -> &str {
        &self.input.voice_id
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.input.options
    }

    pub fn upstream_request(&self) -> &UpstreamRequest {
        &self.input
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn max_attempts_per_candidate(&self) -> u32 {
        self.max_attempts_per_candidate
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }
}

/// Concatenated payload of one successful stream and its resolved format.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledAudio {
    pub payload: Bytes,
    pub format: SampleFormat,
}

/// Result of a single upstream attempt, as classified by the orchestrator.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(AssembledAudio),
    TransientFailure(UpstreamError),
    PermanentFailure(UpstreamError),
    EmptyResult,
}

/// Position in the candidate list and attempts spent on the current candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateState {
    pub index: usize,
    pub attempts: u32,
}

impl CandidateState {
    /// Moves to the next candidate, resetting the attempt counter.
    pub fn advance(&mut self) {
        self.index += 1;
        self.attempts = 0;
    }
}

/// Final audio plus the metadata the caller reports.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub audio: Vec<u8>,
    pub content_type: &'static str,
    pub format: OutputFormat,
    /// Candidate that produced the audio.
    pub candidate: Candidate,
    /// Upstream calls made across all candidates, including the successful one.
    pub total_attempts: u32,
    pub sample_format: SampleFormat,
}
