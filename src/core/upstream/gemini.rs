//! Gemini speech generation over the `streamGenerateContent` REST endpoint.
//!
//! The request asks for the `AUDIO` response modality and a prebuilt voice.
//! With `alt=sse` the service answers with server-sent events, each carrying a
//! partial `GenerateContentResponse` whose parts hold base64 encoded PCM and a
//! MIME tag such as `audio/L16;codec=pcm;rate=24000`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::sse::SseDecoder;
use super::{FragmentStream, SpeechUpstream, UpstreamError, UpstreamRequest};
use crate::core::audio::AudioFragment;
use crate::core::synthesis::Candidate;

/// Public Gemini API root.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Finish reasons that mean the content was refused rather than completed.
const BLOCKING_FINISH_REASONS: [&str; 5] = [
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

/// Gemini TTS upstream.
#[derive(Debug, Clone)]
pub struct GeminiUpstream {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiUpstream {
    /// Creates an upstream rooted at `base_url` (for example [`DEFAULT_GEMINI_BASE_URL`]).
    pub fn new(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn endpoint(&self, model_id: &str) -> String {
        format!(
            "{}/models/{model_id}:streamGenerateContent?alt=sse",
            self.base_url
        )
    }

    /// Builds the JSON request body.
    pub fn build_request_body(request: &UpstreamRequest) -> serde_json::Value {
        let text = match request.options.style.as_deref().map(str::trim) {
            Some(style) if !style.is_empty() => format!("{style}\n\n{}", request.text),
            _ => request.text.clone(),
        };

        let mut speech_config = serde_json::json!({
            "voiceConfig": {
                "prebuiltVoiceConfig": { "voiceName": request.voice_id }
            }
        });
        if let Some(language_code) = &request.options.language_code {
            speech_config["languageCode"] = serde_json::json!(language_code);
        }

        let mut generation_config = serde_json::json!({
            "responseModalities": ["AUDIO"],
            "speechConfig": speech_config,
        });
        if let Some(temperature) = request.options.temperature {
            generation_config["temperature"] = serde_json::json!(temperature);
        }

        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": text }]
            }],
            "generationConfig": generation_config
        })
    }
}

#[async_trait]
impl SpeechUpstream for GeminiUpstream {
    async fn open_stream(
        &self,
        candidate: &Candidate,
        request: &UpstreamRequest,
    ) -> Result<FragmentStream, UpstreamError> {
        let body = Self::build_request_body(request);

        debug!(
            model = %candidate.model_id,
            voice = %request.voice_id,
            chars = request.text.chars().count(),
            "Opening Gemini audio stream"
        );

        let response = self
            .client
            .post(self.endpoint(&candidate.model_id))
            .header(API_KEY_HEADER, candidate.credential.expose())
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = extract_error_message(&error_body);
            warn!(model = %candidate.model_id, %status, %message, "Gemini API error");
            return Err(UpstreamError::from_status(status, message));
        }

        Ok(fragment_stream(response.bytes_stream()))
    }
}

/// Pulls the human readable message out of a Gemini error body.
///
/// The body is either `{"error": {...}}` or, on the streaming endpoint, a
/// one-element array of that object. Anything else is returned trimmed.
pub fn extract_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|value| match value {
        serde_json::Value::Array(items) => items.first().and_then(|item| item.get("error")),
        other => other.get("error"),
    });

    error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCandidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

/// Decodes one SSE event payload into the fragments it carries.
fn parse_event(payload: &str) -> Result<Vec<AudioFragment>, UpstreamError> {
    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| UpstreamError::MalformedResponse(format!("invalid event JSON: {e}")))?;

    if let Some(error) = chunk.error {
        let status = error
            .code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Err(UpstreamError::from_status(status, error.message));
    }

    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(UpstreamError::ContentBlocked(format!(
            "prompt blocked: {reason}"
        )));
    }

    let mut fragments = Vec::new();
    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Ok(fragments);
    };

    if let Some(reason) = candidate
        .finish_reason
        .as_deref()
        .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
    {
        return Err(UpstreamError::ContentBlocked(format!(
            "generation stopped: {reason}"
        )));
    }

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    for inline in parts.into_iter().filter_map(|p| p.inline_data) {
        let data = base64::engine::general_purpose::STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| UpstreamError::MalformedResponse(format!("invalid base64 audio: {e}")))?;
        let fragment = match inline.mime_type.as_deref() {
            Some(mime_type) => AudioFragment::with_mime_type(data, mime_type),
            None => AudioFragment::new(data, None),
        };
        fragments.push(fragment);
    }

    Ok(fragments)
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct EventStreamState {
    body: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<AudioFragment>,
    finished: bool,
}

impl EventStreamState {
    fn ingest(&mut self, events: impl IntoIterator<Item = String>) -> Result<(), UpstreamError> {
        for event in events {
            if event.trim() == "[DONE]" {
                continue;
            }
            self.pending.extend(parse_event(&event)?);
        }
        Ok(())
    }
}

/// Turns an SSE response body into a fragment stream.
///
/// The stream ends after the first error.
fn fragment_stream<S>(body: S) -> FragmentStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let state = EventStreamState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), Some(state)));
            }
            if state.finished {
                return None;
            }

            let ingested = match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.ingest(events)
                }
                Some(Err(e)) => Err(UpstreamError::Stream(format!(
                    "failed to read audio stream: {e}"
                ))),
                None => {
                    state.finished = true;
                    let trailing = state.decoder.finish();
                    state.ingest(trailing)
                }
            };

            if let Err(e) = ingested {
                return Some((Err(e), None));
            }
        }
    });

    Box::pin(stream)
}
