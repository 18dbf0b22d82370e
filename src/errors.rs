// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

const SAMPLE_LIMIT: usize = 200;

#[derive(Error, Debug)]
pub enum StyleSenseError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Malformed model response: {sample}")]
    MalformedResponse { sample: String },

    #[error("Upstream service error: {0}")]
    Transport(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Whether a failure is worth waiting out and trying again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableFailure {
    RateLimited,
    Other,
}

impl RetryableFailure {
    const RATE_LIMIT_MARKERS: [&'static str; 3] = ["resource_exhausted", "rate limit", "quota"];
    const RATE_LIMIT_STATUS: &'static str = "429";

    /// Classifies a raw upstream error message by the markers the model
    /// service uses when a quota or request-rate ceiling is hit. The status
    /// code only counts as a standalone number, not inside a port or id.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        if has_standalone_number(&lowered, Self::RATE_LIMIT_STATUS)
            || Self::RATE_LIMIT_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker))
        {
            RetryableFailure::RateLimited
        } else {
            RetryableFailure::Other
        }
    }
}

fn has_standalone_number(haystack: &str, number: &str) -> bool {
    haystack.match_indices(number).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

impl StyleSenseError {
    pub fn failure_kind(&self) -> RetryableFailure {
        match self {
            StyleSenseError::RateLimited(_) => RetryableFailure::RateLimited,
            _ => RetryableFailure::Other,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.failure_kind() == RetryableFailure::RateLimited
    }

    /// Builds the error for a failed upstream call, routing rate-limit
    /// markers to `RateLimited` and everything else to `Transport`.
    pub fn from_upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        match RetryableFailure::classify(&message) {
            RetryableFailure::RateLimited => StyleSenseError::RateLimited(message),
            RetryableFailure::Other => StyleSenseError::Transport(message),
        }
    }

    pub fn malformed(raw: &str) -> Self {
        StyleSenseError::MalformedResponse {
            sample: truncate_sample(raw),
        }
    }

    pub fn missing_credential() -> Self {
        StyleSenseError::Configuration(
            "no API key configured; set GEMINI_API_KEY (or API_KEY) and restart the service"
                .to_string(),
        )
    }
}

fn truncate_sample(raw: &str) -> String {
    if raw.chars().count() <= SAMPLE_LIMIT {
        return raw.to_string();
    }
    raw.chars().take(SAMPLE_LIMIT).collect::<String>() + "…"
}

impl From<serde_json::Error> for StyleSenseError {
    fn from(e: serde_json::Error) -> Self {
        StyleSenseError::Serialization(e.to_string())
    }
}

impl From<redis::RedisError> for StyleSenseError {
    fn from(e: redis::RedisError) -> Self {
        StyleSenseError::Store(e.to_string())
    }
}

impl ResponseError for StyleSenseError {
    fn status_code(&self) -> StatusCode {
        match self {
            StyleSenseError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StyleSenseError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            StyleSenseError::MalformedResponse { .. } | StyleSenseError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            StyleSenseError::Cancelled => StatusCode::CONFLICT,
            StyleSenseError::ImageProcessing(_) | StyleSenseError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            StyleSenseError::NotFound(_) => StatusCode::NOT_FOUND,
            StyleSenseError::Store(_) | StyleSenseError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let label = match self {
            StyleSenseError::Configuration(_) => "Service not configured",
            StyleSenseError::RateLimited(_) => "AI service is busy, try again shortly",
            StyleSenseError::MalformedResponse { .. } => "AI service returned an unreadable answer",
            StyleSenseError::Transport(_) => "AI service error",
            StyleSenseError::Cancelled => "Request superseded",
            StyleSenseError::ImageProcessing(_) => "Image processing error",
            StyleSenseError::Store(_) => "Storage error",
            StyleSenseError::Serialization(_) => "Data processing error",
            StyleSenseError::Validation(_) => "Validation error",
            StyleSenseError::NotFound(_) => "Not found",
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": label,
            "message": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognises_rate_limit_markers() {
        assert_eq!(
            RetryableFailure::classify("status 429 Too Many Requests"),
            RetryableFailure::RateLimited
        );
        assert_eq!(
            RetryableFailure::classify(r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#),
            RetryableFailure::RateLimited
        );
        assert_eq!(
            RetryableFailure::classify("You exceeded your current quota"),
            RetryableFailure::RateLimited
        );
        assert_eq!(
            RetryableFailure::classify("status 500: internal error"),
            RetryableFailure::Other
        );
    }

    #[test]
    fn digits_inside_other_numbers_are_not_a_status() {
        assert_eq!(
            RetryableFailure::classify(
                "Gemini request failed: error sending request for url (http://127.0.0.1:14290/v1beta)"
            ),
            RetryableFailure::Other
        );
        assert_eq!(
            RetryableFailure::classify("request id a4291f failed"),
            RetryableFailure::Other
        );
        assert_eq!(
            RetryableFailure::classify("Gemini error (status 429): slow down"),
            RetryableFailure::RateLimited
        );
    }

    #[test]
    fn from_upstream_routes_by_classification() {
        assert!(StyleSenseError::from_upstream("429 slow down").is_rate_limited());
        assert!(matches!(
            StyleSenseError::from_upstream("connection reset"),
            StyleSenseError::Transport(_)
        ));
    }

    #[test]
    fn malformed_truncates_long_samples() {
        let raw = "x".repeat(500);
        match StyleSenseError::malformed(&raw) {
            StyleSenseError::MalformedResponse { sample } => {
                assert_eq!(sample.chars().count(), SAMPLE_LIMIT + 1);
                assert!(sample.ends_with('…'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            StyleSenseError::RateLimited("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            StyleSenseError::missing_credential().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            StyleSenseError::malformed("oops").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
