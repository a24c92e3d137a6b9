//! Error types for retrieval.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Failures while searching.
///
/// An empty or irrelevant result set is not an error; these variants cover
/// transport and service failures only.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding service failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] kdesk_llm::LlmError),

    /// The vector store answered with an error.
    #[error("vector store error: {0}")]
    Store(String),

    /// The vector store could not be reached.
    #[error("vector store unreachable: {0}")]
    Network(String),

    /// The store's response could not be decoded.
    #[error("unexpected vector store response: {0}")]
    Decode(String),

    /// The query was rejected before any call was made.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RetrievalError::Decode(err.to_string())
        } else {
            RetrievalError::Network(err.to_string())
        }
    }
}
