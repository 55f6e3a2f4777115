//! Error types for calls against the seat availability backend.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    /// Network/HTTP request failed before a response arrived
    #[error("Network error: {message}")]
    Network { message: String },

    /// The backend answered with a non-success status
    #[error("Request failed with status {status}{}", format_detail(.detail))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    /// The requested resource does not exist
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The response body could not be decoded
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    Url { message: String },
}

fn format_detail(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

impl ApiError {
    /// Returns true if the backend reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
            || matches!(self, ApiError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// Returns the backend-provided `detail` message if one was sent.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Message suitable for a one-line notice: the backend's `detail` when
    /// present, otherwise `fallback`.
    pub fn user_message<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.detail().unwrap_or(fallback)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode {
                message: err.to_string(),
            }
        } else {
            ApiError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::Url {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_detail() {
        let err = ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            detail: Some("Alert already exists".to_string()),
        };
        assert_eq!(err.user_message("Failed to create alert"), "Alert already exists");

        let err = ApiError::Network {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.user_message("Failed to create alert"), "Failed to create alert");
    }

    #[test]
    fn test_not_found_detection() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            detail: None,
        };
        assert!(err.is_not_found());
        assert!(ApiError::NotFound {
            resource: "user".to_string()
        }
        .is_not_found());
        assert!(!ApiError::Decode {
            message: String::new()
        }
        .is_not_found());
    }
}
