//! Backend client errors.

use stride_core::RemoteError;
use thiserror::Error;

/// Longest error body kept from a plain-text response.
const MAX_MESSAGE_CHARS: usize = 300;

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error: {status}{}", .message.as_deref().map(|m| format!(" - {m}")).unwrap_or_default())]
    Status { status: u16, message: Option<String> },

    /// The response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An endpoint path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    /// HTTP status of a rejected request.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<BackendError> for RemoteError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Status { status: 401, .. } => Self::SessionExpired,
            BackendError::Status { status: 404, .. } => Self::NotFound,
            BackendError::Status { status, message } => Self::Rejected { status, message },
            BackendError::Http(e) => Self::Network(e.to_string()),
            BackendError::Parse(e) => Self::Network(format!("unexpected response: {e}")),
            BackendError::Url(e) => Self::Network(e.to_string()),
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers either with JSON (`{"message": ...}`, `{"error": ...}`
/// or a bare JSON string) or with plain text.
pub fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => ["message", "error"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(serde_json::Value::as_str))
            .map(str::trim)
            .find(|m| !m.is_empty())
            .map(ToString::to_string),
        Ok(serde_json::Value::String(message)) => {
            Some(message.trim().to_string()).filter(|m| !m.is_empty())
        }
        Ok(_) => None,
        Err(_) => Some(body.chars().take(MAX_MESSAGE_CHARS).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"message":"Out of stock"}"#).as_deref(),
            Some("Out of stock")
        );
        assert_eq!(
            error_message(r#"{"timestamp":"x","error":"Bad Request","status":400}"#).as_deref(),
            Some("Bad Request")
        );
        assert_eq!(error_message(r#""No review found""#).as_deref(), Some("No review found"));
        assert_eq!(
            error_message("Failed to add review: already reviewed").as_deref(),
            Some("Failed to add review: already reviewed")
        );
        assert_eq!(error_message("   "), None);
        assert_eq!(error_message(r#"{"message":""}"#), None);
        assert_eq!(error_message("[1,2]"), None);
    }

    #[test]
    fn test_plain_text_is_truncated() {
        let long = "x".repeat(1000);
        assert_eq!(error_message(&long).unwrap_or_default().len(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_remote_error_mapping() {
        let status = |status, message: Option<&str>| BackendError::Status {
            status,
            message: message.map(ToString::to_string),
        };

        assert_eq!(RemoteError::from(status(401, None)), RemoteError::SessionExpired);
        assert_eq!(RemoteError::from(status(404, Some("gone"))), RemoteError::NotFound);
        assert_eq!(
            RemoteError::from(status(400, Some("Out of stock"))),
            RemoteError::rejected(400, "Out of stock")
        );
        assert!(matches!(
            RemoteError::from(BackendError::Parse("eof".into())),
            RemoteError::Network(_)
        ));
    }

    #[test]
    fn test_display() {
        let err = BackendError::Status {
            status: 500,
            message: Some("Failed to create order: db down".into()),
        };
        assert_eq!(err.to_string(), "API error: 500 - Failed to create order: db down");
        assert_eq!(err.status(), Some(500));
    }
}
