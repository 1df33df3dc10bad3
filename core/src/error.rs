//! Error types for the Redmine issue client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the issue does not exist" from "the server rejected the request." Any
//! other non-success status is decoded as a Redmine errors envelope and lands
//! in `Service`; when that envelope itself is unreadable the decode failure
//! is surfaced as `Deserialization` instead.

use thiserror::Error;

/// Errors returned by `IssueClient` and `IssueService`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport could not complete the round trip.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The server returned 404 for a single-issue get, update or delete.
    #[error("Not Found")]
    NotFound,

    /// The server returned a non-success status with an errors envelope.
    #[error("{}", messages.join("\n"))]
    Service { status: u16, messages: Vec<String> },

    /// A response body could not be deserialized into the expected envelope.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Client configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Messages reported by the server, empty for every other variant.
    pub fn messages(&self) -> &[String] {
        match self {
            ApiError::Service { messages, .. } => messages,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_joins_messages_with_newline() {
        let err = ApiError::Service {
            status: 422,
            messages: vec!["Subject cannot be blank".to_string(), "Tracker is invalid".to_string()],
        };
        assert_eq!(err.to_string(), "Subject cannot be blank\nTracker is invalid");
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn not_found_display() {
        assert_eq!(ApiError::NotFound.to_string(), "Not Found");
        assert!(ApiError::NotFound.messages().is_empty());
    }

    #[test]
    fn config_error_display() {
        let err = ApiError::Config("REDMINE_ENDPOINT is not set".to_string());
        assert_eq!(err.to_string(), "invalid configuration: REDMINE_ENDPOINT is not set");
    }
}
