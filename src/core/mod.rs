pub mod audio;
pub mod candidates;
pub mod synthesis;
pub mod text;
pub mod upstream;

// Re-export commonly used types for convenience
pub use audio::{AudioError, AudioFragment, SampleFormat, TranscodeSource, Transcoder, build_wav};
pub use candidates::CandidateResolver;
pub use synthesis::{
    BackoffPolicy, Candidate, Credential, OutputFormat, SynthesisError, SynthesisOrchestrator,
    SynthesisOutput, SynthesisRequest,
};
pub use text::{Passthrough, TagWhitelist, TextPipeline, TextPreprocessor};
pub use upstream::{GeminiUpstream, GenerationOptions, SpeechUpstream, UpstreamError, UpstreamRequest};
