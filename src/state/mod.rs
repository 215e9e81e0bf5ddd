use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::candidates::CandidateResolver;
use crate::core::synthesis::SynthesisOrchestrator;
use crate::core::text::TextPipeline;
use crate::core::upstream::{GeminiUpstream, SpeechUpstream, UpstreamError};

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Retry/failover pipeline bound to the configured upstream
    pub orchestrator: SynthesisOrchestrator,
    /// Maps `model_to_use` nicknames to candidate lists
    pub resolver: CandidateResolver,
    /// Pre-processing applied to every inbound text
    pub text: Arc<TextPipeline>,
}

impl AppState {
    /// Builds the state with the Gemini streaming client.
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, UpstreamError> {
        let upstream = GeminiUpstream::new(config.gemini_base_url.clone())?;
        tracing::info!(
            base_url = %config.gemini_base_url,
            credentials = config.gemini_api_keys.len(),
            default_model = %config.default_model,
            "Gemini upstream configured"
        );
        Ok(Self::with_upstream(config, Arc::new(upstream)))
    }

    /// Builds the state around any upstream implementation.
    pub fn with_upstream(config: ServerConfig, upstream: Arc<dyn SpeechUpstream>) -> Arc<Self> {
        let orchestrator =
            SynthesisOrchestrator::new(upstream, config.backoff_policy(), config.transcoder());
        let resolver = config.candidate_resolver();
        let text = Arc::new(TextPipeline::from_allowed_tags(
            config.allowed_tags.as_deref(),
        ));

        Arc::new(Self {
            config,
            orchestrator,
            resolver,
            text,
        })
    }
}
