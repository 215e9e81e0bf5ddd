use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::core::synthesis::SynthesisError;

/// Application error type
#[derive(Debug)]
pub enum AppError {
    InternalServerError(String),
    BadRequest(String),
    PayloadTooLarge(String),
    GatewayTimeout(String),
    /// Failure reported by the synthesis pipeline, mapped by its kind
    Synthesis(SynthesisError),
}

impl AppError {
    /// HTTP status returned for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Synthesis(err) => match err {
                SynthesisError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                SynthesisError::AllCandidatesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SynthesisError::ContainerBuild(_) | SynthesisError::Transcode(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Machine readable tag included in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "internal",
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::GatewayTimeout(_) => "timeout",
            AppError::Synthesis(err) => err.kind(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let error_message = match &self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                msg.clone()
            }
            AppError::PayloadTooLarge(msg) => {
                tracing::warn!("Payload too large: {}", msg);
                msg.clone()
            }
            AppError::GatewayTimeout(msg) => {
                tracing::error!("Request timed out: {}", msg);
                msg.clone()
            }
            AppError::Synthesis(err) => {
                if status.is_server_error() {
                    tracing::error!(kind, "Synthesis failed: {}", err);
                } else {
                    tracing::warn!(kind, "Synthesis rejected: {}", err);
                }
                err.to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {msg}"),
            AppError::GatewayTimeout(msg) => write!(f, "Gateway timeout: {msg}"),
            AppError::Synthesis(err) => write!(f, "Synthesis error: {err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<SynthesisError> for AppError {
    fn from(err: SynthesisError) -> Self {
        AppError::Synthesis(err)
    }
}

impl From<Box<dyn std::error::Error>> for AppError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_bad_request_keeps_message() {
        let (status, json) = body_json(AppError::BadRequest("text is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "text is required");
        assert_eq!(json["kind"], "bad_request");
        assert_eq!(json["status"], 400);
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (status, json) =
            body_json(AppError::InternalServerError("secret detail".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_exhausted_maps_to_503_with_last_failure() {
        let err = SynthesisError::AllCandidatesExhausted {
            attempts: 4,
            last_failure: Some("Rate limited: quota".to_string()),
        };
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["kind"], "all_candidates_exhausted");
        let message = json["error"].as_str().unwrap();
        assert!(message.contains("4 attempts"));
        assert!(message.contains("quota"));
    }

    #[tokio::test]
    async fn test_transcode_is_distinct_from_exhaustion() {
        let (status, json) =
            body_json(SynthesisError::Transcode("lame refused".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["kind"], "transcode");
    }

    #[tokio::test]
    async fn test_invalid_request_maps_to_400() {
        let (status, _) =
            body_json(SynthesisError::InvalidRequest("unknown model".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
