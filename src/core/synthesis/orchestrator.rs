//! Retry and failover across candidates, then packaging of the winning audio.
//!
//! One run is strictly sequential: candidates are tried in list order, each
//! at most `max_attempts_per_candidate` times, and never revisited once the
//! run has moved past them.
//!
//! | Outcome              | Next step                                          |
//! |----------------------|----------------------------------------------------|
//! | `Success`            | build the container / compressed output and return |
//! | `EmptyResult`        | next candidate, no wait                            |
//! | `TransientFailure`   | retry after backoff, or next candidate at ceiling  |
//! | `PermanentFailure`   | next candidate, no wait                            |

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::accumulator::accumulate;
use super::error::{SynthesisError, SynthesisResult};
use super::retry::BackoffPolicy;
use super::types::{
    AssembledAudio, AttemptOutcome, Candidate, CandidateState, OutputFormat, SynthesisOutput,
    SynthesisRequest,
};
use crate::core::audio::{TranscodeSource, Transcoder, build_wav};
use crate::core::upstream::{SpeechUpstream, UpstreamError, UpstreamRequest};

/// Decides whether an upstream failure is worth retrying on the same candidate.
///
/// Rate limits, overload, network and mid-stream failures are transient.
/// Credential, request, content policy and decoding failures are permanent.
pub fn classify_failure(error: UpstreamError) -> AttemptOutcome {
    match error {
        UpstreamError::RateLimited(_)
        | UpstreamError::ServiceUnavailable { .. }
        | UpstreamError::Network(_)
        | UpstreamError::Stream(_) => AttemptOutcome::TransientFailure(error),
        UpstreamError::Unauthorized { .. }
        | UpstreamError::Rejected { .. }
        | UpstreamError::ContentBlocked(_)
        | UpstreamError::MalformedResponse(_) => AttemptOutcome::PermanentFailure(error),
    }
}

/// Drives a [`SynthesisRequest`] to a finished audio payload.
#[derive(Clone)]
pub struct SynthesisOrchestrator {
    upstream: Arc<dyn SpeechUpstream>,
    backoff: BackoffPolicy,
    transcoder: Transcoder,
}

impl SynthesisOrchestrator {
    pub fn new(
        upstream: Arc<dyn SpeechUpstream>,
        backoff: BackoffPolicy,
        transcoder: Transcoder,
    ) -> Self {
        Self {
            upstream,
            backoff,
            transcoder,
        }
    }

    /// Runs the retry/failover loop and packages the first successful audio.
    ///
    /// Dropping the returned future abandons the in-flight upstream stream and
    /// its partial buffer.
    ///
    /// # Errors
    /// - `AllCandidatesExhausted` when no candidate produced audio
    /// - `ContainerBuild` / `Transcode` when audio was produced but could not be packaged
    pub async fn synthesize(&self, request: &SynthesisRequest) -> SynthesisResult<SynthesisOutput> {
        let candidates = request.candidates();
        let max_attempts = request.max_attempts_per_candidate();

        let mut state = CandidateState::default();
        let mut total_attempts = 0u32;
        let mut last_failure: Option<UpstreamError> = None;

        while let Some(candidate) = candidates.get(state.index) {
            total_attempts += 1;
            let outcome = self
                .attempt(candidate, request.upstream_request())
                .await;

            match outcome {
                AttemptOutcome::Success(audio) => {
                    info!(
                        candidate = %candidate.nickname,
                        model = %candidate.model_id,
                        attempts = total_attempts,
                        bytes = audio.payload.len(),
                        "Upstream produced audio"
                    );
                    return self.build_output(
                        audio,
                        request.output_format(),
                        candidate.clone(),
                        total_attempts,
                    );
                }
                AttemptOutcome::EmptyResult => {
                    warn!(
                        candidate = %candidate.nickname,
                        model = %candidate.model_id,
                        "Upstream returned no audio, moving to next candidate"
                    );
                    state.advance();
                }
                AttemptOutcome::PermanentFailure(reason) => {
                    warn!(
                        candidate = %candidate.nickname,
                        model = %candidate.model_id,
                        credential = %candidate.credential.hint(),
                        error = %reason,
                        "Permanent upstream failure, moving to next candidate"
                    );
                    last_failure = Some(reason);
                    state.advance();
                }
                AttemptOutcome::TransientFailure(reason) => {
                    state.attempts += 1;
                    if state.attempts >= max_attempts {
                        warn!(
                            candidate = %candidate.nickname,
                            model = %candidate.model_id,
                            attempts = state.attempts,
                            error = %reason,
                            "Candidate exhausted its attempts, moving to next candidate"
                        );
                        state.advance();
                    } else {
                        let delay = self.backoff.delay_for(state.attempts);
                        warn!(
                            candidate = %candidate.nickname,
                            model = %candidate.model_id,
                            attempt = state.attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %reason,
                            "Transient upstream failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_failure = Some(reason);
                }
            }
        }

        warn!(
            candidates = candidates.len(),
            attempts = total_attempts,
            "All candidates exhausted"
        );
        Err(SynthesisError::exhausted(
            total_attempts,
            last_failure.as_ref(),
        ))
    }

    /// One upstream call, fully accumulated and classified.
    async fn attempt(&self, candidate: &Candidate, input: &UpstreamRequest) -> AttemptOutcome {
        debug!(
            candidate = %candidate.nickname,
            model = %candidate.model_id,
            "Starting upstream attempt"
        );

        let stream = match self.upstream.open_stream(candidate, input).await {
            Ok(stream) => stream,
            Err(e) => return classify_failure(e),
        };

        match accumulate(stream).await {
            Ok(Some(audio)) => AttemptOutcome::Success(audio),
            Ok(None) => AttemptOutcome::EmptyResult,
            Err(e) => classify_failure(e),
        }
    }

    fn build_output(
        &self,
        audio: AssembledAudio,
        output_format: OutputFormat,
        candidate: Candidate,
        total_attempts: u32,
    ) -> SynthesisResult<SynthesisOutput> {
        let container = build_wav(&audio.payload, &audio.format)?;

        let (bytes, content_type) = match output_format {
            OutputFormat::RawContainer => (container, "audio/wav"),
            OutputFormat::Compressed => {
                let compressed = self
                    .transcoder
                    .transcode(TranscodeSource::Container(&container))?;
                (compressed, self.transcoder.content_type())
            }
        };

        debug!(
            format = %output_format,
            output_bytes = bytes.len(),
            "Packaged synthesized audio"
        );

        Ok(SynthesisOutput {
            audio: bytes,
            content_type,
            format: output_format,
            candidate,
            total_attempts,
            sample_format: audio.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let transient = [
            UpstreamError::RateLimited("quota".into()),
            UpstreamError::ServiceUnavailable {
                status: 503,
                message: "overloaded".into(),
            },
            UpstreamError::Network("refused".into()),
            UpstreamError::Stream("reset".into()),
        ];
        for error in transient {
            assert!(matches!(
                classify_failure(error),
                AttemptOutcome::TransientFailure(_)
            ));
        }

        let permanent = [
            UpstreamError::Unauthorized {
                status: 401,
                message: "bad key".into(),
            },
            UpstreamError::Rejected {
                status: 400,
                message: "bad voice".into(),
            },
            UpstreamError::ContentBlocked("SAFETY".into()),
            UpstreamError::MalformedResponse("not json".into()),
        ];
        for error in permanent {
            assert!(matches!(
                classify_failure(error),
                AttemptOutcome::PermanentFailure(_)
            ));
        }
    }
}
