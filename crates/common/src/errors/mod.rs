//! Error types for NewsRAG services
//!
//! Provides a shared error taxonomy with:
//! - Distinct kinds for each pipeline failure mode
//! - HTTP status code mapping for the query API
//! - Structured error responses
//! - Machine-readable error codes

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,

    // Resource errors (4xxx)
    NotFound,
    ArticleNotFound,

    // Conflict errors (5xxx)
    DuplicateUrl,

    // Pipeline errors (6xxx)
    FetchFailed,
    ExtractionFailed,
    EmbeddingFailed,
    GenerationFailed,

    // Database errors (7xxx)
    DatabaseError,
    StoreUnavailable,
    SchemaMismatch,

    // External service errors (8xxx)
    QueueError,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::ArticleNotFound => 4002,

            // Conflicts (5xxx)
            ErrorCode::DuplicateUrl => 5001,

            // Pipeline (6xxx)
            ErrorCode::FetchFailed => 6001,
            ErrorCode::ExtractionFailed => 6002,
            ErrorCode::EmbeddingFailed => 6003,
            ErrorCode::GenerationFailed => 6004,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::StoreUnavailable => 7002,
            ErrorCode::SchemaMismatch => 7003,

            // External (8xxx)
            ErrorCode::QueueError => 8001,
            ErrorCode::UpstreamError => 8002,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
///
/// `DuplicateUrl` and lookup misses are benign control-flow signals and are
/// recovered where they occur; `StoreUnavailable` is retryable;
/// `SchemaMismatch` indicates a deployment misconfiguration (embedding
/// dimension does not match the vector columns) and is fatal.
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    // Resource errors
    #[error("Article not found: {url}")]
    ArticleNotFound { url: String },

    // Conflict errors
    #[error("Article already stored for url: {url}")]
    DuplicateUrl { url: String },

    // Pipeline errors
    #[error("Fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Content extraction failed for {url}: {message}")]
    ExtractionFailed { url: String, message: String },

    #[error("Embedding failed: {message}")]
    EmbeddingFailed { message: String },

    #[error("Answer generation failed: {message}")]
    GenerationFailed { message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Vector schema mismatch: {message}")]
    SchemaMismatch { message: String },

    // External service errors
    #[error("Queue error: {message}")]
    QueueError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::ArticleNotFound { .. } => ErrorCode::ArticleNotFound,
            AppError::DuplicateUrl { .. } => ErrorCode::DuplicateUrl,
            AppError::FetchFailed { .. } => ErrorCode::FetchFailed,
            AppError::ExtractionFailed { .. } => ErrorCode::ExtractionFailed,
            AppError::EmbeddingFailed { .. } => ErrorCode::EmbeddingFailed,
            AppError::GenerationFailed { .. } => ErrorCode::GenerationFailed,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            AppError::QueueError { .. } => ErrorCode::QueueError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::MissingField { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::ArticleNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::DuplicateUrl { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::SchemaMismatch { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::FetchFailed { .. }
            | AppError::ExtractionFailed { .. }
            | AppError::EmbeddingFailed { .. }
            | AppError::GenerationFailed { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::StoreUnavailable { .. } | AppError::QueueError { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Whether a bounded retry at the call site may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable { .. })
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::ArticleNotFound {
            url: "https://news.example/a".into(),
        };
        assert_eq!(err.code(), ErrorCode::ArticleNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_duplicate_url_is_conflict_but_not_retryable() {
        let err = AppError::DuplicateUrl {
            url: "https://news.example/a".into(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_store_unavailable_is_retryable() {
        let err = AppError::StoreUnavailable {
            message: "pool exhausted".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_pipeline_errors_are_bad_gateway() {
        let err = AppError::FetchFailed {
            url: "https://news.example/a".into(),
            message: "timeout".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.is_server_error());
    }
}
