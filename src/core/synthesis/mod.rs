//! The audio synthesis pipeline: stream accumulation, retry/failover and packaging.

mod accumulator;
mod error;
mod orchestrator;
mod retry;
mod types;

pub use accumulator::{StreamAccumulator, accumulate};
pub use error::{SynthesisError, SynthesisResult};
pub use orchestrator::{SynthesisOrchestrator, classify_failure};
pub use retry::{BackoffPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_JITTER};
pub use types::{
    AssembledAudio, AttemptOutcome, Candidate, CandidateState, Credential, OutputFormat,
    SynthesisOutput, SynthesisRequest,
};
