use reqwest::StatusCode;

/// Failures reported by a speech generation upstream.
///
/// The variants describe what happened; whether a failure is worth retrying is
/// decided by the orchestrator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    /// Quota exhausted or too many requests (HTTP 429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Upstream overloaded, timing out or failing internally.
    #[error("Service unavailable ({status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    /// Connection refused, DNS failure, request timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body broke off mid-stream.
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// Credential rejected (HTTP 401/403).
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Request rejected as malformed or unknown (other 4xx).
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The generation service refused the content.
    #[error("Content blocked: {0}")]
    ContentBlocked(String),

    /// The response could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl UpstreamError {
    /// Maps a non-success HTTP status and its extracted message to an error.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let code = status.as_u16();
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(message),
            StatusCode::REQUEST_TIMEOUT => Self::ServiceUnavailable {
                status: code,
                message,
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized {
                status: code,
                message,
            },
            s if s.is_server_error() => Self::ServiceUnavailable {
                status: code,
                message,
            },
            _ => Self::Rejected {
                status: code,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            Self::from_status(status, e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Stream(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_variants() {
        assert!(matches!(
            UpstreamError::from_status(StatusCode::TOO_MANY_REQUESTS, "quota"),
            UpstreamError::RateLimited(msg) if msg == "quota"
        ));
        assert!(matches!(
            UpstreamError::from_status(StatusCode::FORBIDDEN, "denied"),
            UpstreamError::Unauthorized { status: 403, .. }
        ));
        assert!(matches!(
            UpstreamError::from_status(StatusCode::NOT_FOUND, "no model"),
            UpstreamError::Rejected { status: 404, .. }
        ));
        assert!(matches!(
            UpstreamError::from_status(StatusCode::REQUEST_TIMEOUT, "slow"),
            UpstreamError::ServiceUnavailable { status: 408, .. }
        ));
        assert!(matches!(
            UpstreamError::from_status(StatusCode::BAD_GATEWAY, "down"),
            UpstreamError::ServiceUnavailable { status: 502, .. }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = UpstreamError::ServiceUnavailable {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "Service unavailable (503): overloaded");
        assert_eq!(
            UpstreamError::ContentBlocked("SAFETY".to_string()).to_string(),
            "Content blocked: SAFETY"
        );
    }
}
