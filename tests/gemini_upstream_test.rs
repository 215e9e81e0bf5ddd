//! Gemini streaming client against a wiremock server.

use std::sync::Arc;

use base64::Engine;
use futures::StreamExt;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, query_param},
};

use narrator::core::audio::Transcoder;
use narrator::core::synthesis::{
    BackoffPolicy, Candidate, Credential, OutputFormat, SynthesisError, SynthesisOrchestrator,
    SynthesisRequest,
};
use narrator::core::upstream::{
    GeminiUpstream, GenerationOptions, SpeechUpstream, UpstreamError, UpstreamRequest,
};

fn audio_event(pcm: &[u8], mime_type: &str) -> String {
    let data = base64::engine::general_purpose::STANDARD.encode(pcm);
    let event = json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "inlineData": { "mimeType": mime_type, "data": data } }]
            }
        }]
    });
    format!("data: {event}\r\n\r\n")
}

fn sse_response(events: &[String]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(events.concat().into_bytes(), "text/event-stream")
}

fn model_path(model_id: &str) -> String {
    format!("/v1beta/models/{model_id}:streamGenerateContent")
}

fn upstream_for(server: &MockServer) -> GeminiUpstream {
    GeminiUpstream::new(format!("{}/v1beta", server.uri())).unwrap()
}

fn candidate(model_id: &str, key: &str) -> Candidate {
    Candidate::new("flash", model_id, Credential::new(key))
}

#[tokio::test]
async fn test_streams_fragments_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(model_path("model-a")))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "key-1"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Speak softly\n\nHello there" }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Kore" } },
                    "languageCode": "pt-BR"
                }
            }
        })))
        .respond_with(sse_response(&[
            audio_event(&[1, 2], "audio/L16;codec=pcm;rate=24000"),
            audio_event(&[3, 4, 5, 6], "audio/L16;codec=pcm;rate=24000"),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let request = UpstreamRequest::new("Hello there", "Kore").with_options(GenerationOptions {
        temperature: None,
        style: Some("Speak softly".to_string()),
        language_code: Some("pt-BR".to_string()),
    });

    let stream = upstream_for(&server)
        .open_stream(&candidate("model-a", "key-1"), &request)
        .await
        .unwrap();
    let fragments: Vec<_> = stream.collect().await;

    assert_eq!(fragments.len(), 2);
    let first = fragments[0].as_ref().unwrap();
    let second = fragments[1].as_ref().unwrap();
    assert_eq!(&first.data[..], &[1, 2]);
    assert_eq!(&second.data[..], &[3, 4, 5, 6]);
    assert_eq!(first.format.unwrap().sample_rate_hz, 24_000);
}

#[tokio::test]
async fn test_rate_limit_is_reported_before_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(model_path("model-a")))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!([{
            "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
        }])))
        .mount(&server)
        .await;

    let result = upstream_for(&server)
        .open_stream(
            &candidate("model-a", "key-1"),
            &UpstreamRequest::new("Hi", "Kore"),
        )
        .await;

    match result {
        Err(UpstreamError::RateLimited(message)) => {
            assert_eq!(message, "Resource has been exhausted")
        }
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[tokio::test]
async fn test_invalid_key_is_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(model_path("model-a")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    let result = upstream_for(&server)
        .open_stream(
            &candidate("model-a", "bad"),
            &UpstreamRequest::new("Hi", "Kore"),
        )
        .await;

    assert!(matches!(
        result,
        Err(UpstreamError::Unauthorized { status: 403, ref message }) if message == "API key not valid"
    ));
}

#[tokio::test]
async fn test_safety_stop_ends_stream_with_content_blocked() {
    let server = MockServer::start().await;

    let blocked = format!(
        "data: {}\n\n",
        json!({ "candidates": [{ "finishReason": "SAFETY" }] })
    );
    Mock::given(method("POST"))
        .and(path(model_path("model-a")))
        .respond_with(sse_response(&[
            audio_event(&[9, 9], "audio/L16;rate=24000"),
            blocked,
            audio_event(&[7, 7], "audio/L16;rate=24000"),
        ]))
        .mount(&server)
        .await;

    let stream = upstream_for(&server)
        .open_stream(
            &candidate("model-a", "key-1"),
            &UpstreamRequest::new("Hi", "Kore"),
        )
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(UpstreamError::ContentBlocked(_))));
}

#[tokio::test]
async fn test_orchestrator_fails_over_between_models() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(model_path("model-a")))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "The model is overloaded" }
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(model_path("model-b")))
        .respond_with(sse_response(&[audio_event(
            &[1, 0, 2, 0],
            "audio/L16;codec=pcm;rate=8000",
        )]))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = SynthesisOrchestrator::new(
        Arc::new(upstream_for(&server)),
        BackoffPolicy::immediate(),
        Transcoder::default(),
    );
    let request = SynthesisRequest::new(
        UpstreamRequest::new("Hello", "Kore"),
        vec![
            Candidate::new("flash", "model-a", Credential::new("key-1")),
            Candidate::new("flash", "model-b", Credential::new("key-1")),
        ],
        2,
        OutputFormat::RawContainer,
    )
    .unwrap();

    let output = orchestrator.synthesize(&request).await.unwrap();

    assert_eq!(output.candidate.model_id, "model-b");
    assert_eq!(output.total_attempts, 3);
    assert_eq!(output.sample_format.sample_rate_hz, 8000);
    assert_eq!(&output.audio[44..], &[1, 0, 2, 0]);
}

#[tokio::test]
async fn test_orchestrator_reports_last_upstream_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(model_path("model-a")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "Voice name is not supported" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = SynthesisOrchestrator::new(
        Arc::new(upstream_for(&server)),
        BackoffPolicy::immediate(),
        Transcoder::default(),
    );
    let request = SynthesisRequest::new(
        UpstreamRequest::new("Hello", "Nope"),
        vec![candidate("model-a", "key-1")],
        3,
        OutputFormat::Compressed,
    )
    .unwrap();

    let err = orchestrator.synthesize(&request).await.unwrap_err();
    match err {
        SynthesisError::AllCandidatesExhausted {
            attempts,
            last_failure,
        } => {
            assert_eq!(attempts, 1);
            assert!(last_failure.unwrap().contains("Voice name is not supported"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
