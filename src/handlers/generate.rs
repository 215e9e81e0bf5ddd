use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::synthesis::SynthesisRequest;
use crate::core::text::TextPreprocessor;
use crate::core::upstream::{GenerationOptions, UpstreamRequest};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Nickname of the candidate that produced the audio.
pub const MODEL_USED_HEADER: HeaderName = HeaderName::from_static("x-model-used");
/// Concrete model identifier that produced the audio.
pub const MODEL_ID_HEADER: HeaderName = HeaderName::from_static("x-model-id");

/// Request body for the generate-audio endpoint
///
/// `text` and `voice` are optional at the serde level so that a missing field
/// is reported as a 400 with a readable message.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateAudioRequest {
    pub text: Option<String>,
    pub voice: Option<String>,
    /// Model nickname, e.g. `flash` or `pro`
    pub model_to_use: Option<String>,
    pub temperature: Option<f32>,
    /// Delivery instruction placed before the text
    pub style: Option<String>,
}

/// Synthesize speech for the given text and return the audio file
///
/// # Responses
/// - 200: audio body (`audio/wav` or `audio/mpeg`) with `X-Model-Used` and `X-Model-Id`
/// - 400: blank text, missing voice or unknown model
/// - 413: text longer than the configured limit
/// - 503: every candidate failed
/// - 504: the request timed out
/// - 500: audio was produced but could not be packaged
pub async fn generate_audio(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateAudioRequest>,
) -> AppResult<Response> {
    let text = request.text.as_deref().unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AppError::BadRequest("Text cannot be empty".to_string()));
    }

    let voice = request
        .voice
        .as_deref()
        .map(str::trim)
        .filter(|voice| !voice.is_empty())
        .ok_or_else(|| AppError::BadRequest("Voice is required".to_string()))?;

    let max_chars = state.config.max_text_chars;
    let char_count = text.chars().count();
    if char_count > max_chars {
        return Err(AppError::PayloadTooLarge(format!(
            "Text has {char_count} characters, the limit is {max_chars}"
        )));
    }

    info!(
        voice,
        model = request.model_to_use.as_deref().unwrap_or(state.resolver.default_nickname()),
        chars = char_count,
        "Generate audio request received"
    );

    let processed_text = state.text.process(text);
    let options = GenerationOptions {
        temperature: request.temperature,
        style: request.style.clone(),
        language_code: state.config.language_code.clone(),
    };
    let upstream_request = UpstreamRequest::new(processed_text, voice).with_options(options);

    let candidates = state.resolver.resolve(request.model_to_use.as_deref())?;
    let synthesis_request = SynthesisRequest::new(
        upstream_request,
        candidates,
        state.config.max_attempts_per_candidate,
        state.config.output_format,
    )?;

    let timeout = state.config.request_timeout();
    let output = match tokio::time::timeout(
        timeout,
        state.orchestrator.synthesize(&synthesis_request),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Synthesis abandoned on timeout");
            return Err(AppError::GatewayTimeout(format!(
                "Audio generation did not finish within {} seconds",
                timeout.as_secs()
            )));
        }
    };

    let model_used = HeaderValue::from_str(&output.candidate.nickname)
        .map_err(|e| AppError::InternalServerError(format!("Invalid nickname header: {e}")))?;
    let model_id = HeaderValue::from_str(&output.candidate.model_id)
        .map_err(|e| AppError::InternalServerError(format!("Invalid model id header: {e}")))?;

    info!(
        candidate = %output.candidate.nickname,
        model = %output.candidate.model_id,
        attempts = output.total_attempts,
        format = %output.format,
        bytes = output.audio.len(),
        "Audio generated"
    );

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(output.content_type)),
            (MODEL_USED_HEADER, model_used),
            (MODEL_ID_HEADER, model_id),
        ],
        output.audio,
    )
        .into_response())
}
