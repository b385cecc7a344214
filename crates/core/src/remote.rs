//! Errors reported by remote collaborators.
//!
//! Every collaborator trait in this crate (`CartStore`, `OrderGateway`,
//! `ReviewGateway`, ...) fails with [`RemoteError`]. The storefront converts
//! its HTTP client errors into this type so the core can decide what the
//! shopper sees without knowing about HTTP.

use thiserror::Error;

/// A failed call to the commerce backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The credential was rejected (HTTP 401).
    #[error("session expired")]
    SessionExpired,

    /// The addressed resource does not exist (HTTP 404).
    #[error("not found")]
    NotFound,

    /// The backend refused the request.
    ///
    /// `message` carries the backend's own explanation when it sent one.
    #[error("{}", rejected_display(*status, message.as_deref()))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error detail from the response body.
        message: Option<String>,
    },

    /// The request never produced a usable response.
    #[error("network error: {0}")]
    Network(String),
}

impl RemoteError {
    /// Backend-supplied error detail, if any.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }

    /// Shorthand for a rejection carrying a message.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: Some(message.into()),
        }
    }
}

fn rejected_display(status: u16, message: Option<&str>) -> String {
    message.map_or_else(
        || format!("request failed with status {status}"),
        ToString::to_string,
    )
}
