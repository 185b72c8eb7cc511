use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::api::routing::RouteClass;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized on {class} route")]
    Unauthorized { class: RouteClass },

    #[error("backend returned {status}{}", message_suffix(.message))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("backend rejected the request{}", message_suffix(.message))]
    Rejected { message: Option<String> },

    #[error("failed to reach backend: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("credential store error: {0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Store(err)
    }
}

impl ApiError {
    /// Message supplied by the backend, if it sent one.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } | ApiError::Rejected { message } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    /// Backend message verbatim when present, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        self.backend_message()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
}

/// Pull a human-readable message out of an error body. JSON envelopes with a
/// `message` or `error` field win; other non-blank bodies are used as-is.
pub fn parse_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorEnvelope>(trimmed) {
        Ok(env) => env
            .message
            .or(env.error)
            .filter(|m| !m.trim().is_empty()),
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_message_prefers_envelope_fields() {
        assert_eq!(
            parse_error_message(r#"{"success":false,"message":"Nothing to settle"}"#).as_deref(),
            Some("Nothing to settle")
        );
        assert_eq!(
            parse_error_message(r#"{"error":"Gym not found"}"#).as_deref(),
            Some("Gym not found")
        );
        assert_eq!(parse_error_message(r#"{"success":false}"#), None);
        assert_eq!(parse_error_message("  "), None);
        assert_eq!(
            parse_error_message("Bad Gateway").as_deref(),
            Some("Bad Gateway")
        );
    }

    #[test]
    fn user_message_falls_back() {
        let err = ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: Some("Already settled".into()),
        };
        assert_eq!(err.user_message("Failed"), "Already settled");
        assert_eq!(err.to_string(), "backend returned 400 Bad Request: Already settled");

        let err = ApiError::InvalidUrl("::".into());
        assert_eq!(err.user_message("Failed"), "Failed");
    }
}
