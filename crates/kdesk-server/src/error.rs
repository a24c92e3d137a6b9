//! Error types for the server.
//!
//! Every error response has the same body: `{"message": .., "error": [..]}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use kdesk_config::ConfigError;

use crate::validation::ValidationIssue;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Session credentials are missing or malformed.
    #[error("Invalid configuration")]
    Configuration(#[from] ConfigError),

    /// The request body failed validation.
    #[error("Unprocessable Entity.")]
    Validation(Vec<ValidationIssue>),

    /// The model provider failed before streaming began.
    #[error("{0}")]
    Upstream(String),

    /// Agent error.
    #[error("Agent error: {0}")]
    Agent(#[from] kdesk_agent::AgentError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<kdesk_llm::LlmError> for ServerError {
    fn from(e: kdesk_llm::LlmError) -> Self {
        ServerError::Upstream(e.to_string())
    }
}

impl ServerError {
    /// A single validation issue at the document root.
    pub fn invalid_body(message: impl Into<String>) -> Self {
        ServerError::Validation(vec![ValidationIssue::root(message)])
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable summary.
    pub message: String,
    /// Details: remediation hints or validation issues.
    pub error: Vec<Value>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ServerError::Configuration(e) if e.is_credentials() => (
                StatusCode::BAD_REQUEST,
                vec![Value::String(ConfigError::CREDENTIALS_HINT.to_string())],
            ),
            ServerError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()),
            ServerError::Validation(issues) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                issues
                    .iter()
                    .filter_map(|i| serde_json::to_value(i).ok())
                    .collect(),
            ),
            ServerError::Upstream(_) | ServerError::Agent(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
            }
        };

        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, error = %message, details = ?error, "Client error");
        }

        (status, Json(ErrorResponse { message, error })).into_response()
    }
}
