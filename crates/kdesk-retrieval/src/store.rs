//! Vector store access.
//!
//! [`QdrantStore`] talks to Qdrant's REST API directly; only the
//! nearest-neighbour search endpoint is needed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::document::RetrievedDocument;
use crate::error::{Result, RetrievalError};

// ─────────────────────────────────────────────────────────────────────────────
// VectorStore Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Nearest-neighbour search over an indexed collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `limit` documents ordered by descending similarity.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<RetrievedDocument>>;

    /// Name of this store, for logging.
    fn name(&self) -> &str;
}

pub type SharedVectorStore = Arc<dyn VectorStore>;

// ─────────────────────────────────────────────────────────────────────────────
// Qdrant
// ─────────────────────────────────────────────────────────────────────────────

/// Connection settings for a Qdrant collection.
#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for QdrantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("collection", &self.collection)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            collection: collection.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Qdrant REST client bound to one collection.
pub struct QdrantStore {
    client: Client,
    config: QdrantConfig,
}

impl QdrantStore {
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RetrievalError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    fn search_url(&self) -> String {
        format!(
            "{}/collections/{}/points/search",
            self.config.url.trim_end_matches('/'),
            self.config.collection
        )
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<RetrievedDocument>,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<RetrievedDocument>> {
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };

        let mut request = self.client.post(self.search_url()).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Store(format!(
                "Qdrant search in '{}' failed: HTTP {} - {}",
                self.config.collection, status, text
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(format!("Invalid Qdrant response: {e}")))?;

        tracing::debug!(
            collection = %self.config.collection,
            limit,
            returned = parsed.result.len(),
            "qdrant search complete"
        );
        Ok(parsed.result)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Store
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockVectorStore;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use parking_lot::Mutex;

    use super::*;

    /// Returns a fixed document list (truncated to `limit`) for every search.
    #[derive(Debug, Default)]
    pub struct MockVectorStore {
        documents: Vec<RetrievedDocument>,
        fail_with: Option<String>,
        limits: Mutex<Vec<usize>>,
    }

    impl MockVectorStore {
        pub fn new(documents: Vec<RetrievedDocument>) -> Self {
            Self {
                documents,
                ..Default::default()
            }
        }

        pub fn empty() -> Self {
            Self::default()
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                fail_with: Some(message.into()),
                ..Default::default()
            }
        }

        /// The `limit` passed to each search, in call order.
        pub fn limits(&self) -> Vec<usize> {
            self.limits.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.limits.lock().len()
        }
    }

    #[async_trait]
    impl VectorStore for MockVectorStore {
        async fn search(&self, _vector: &[f32], limit: usize) -> Result<Vec<RetrievedDocument>> {
            self.limits.lock().push(limit);
            if let Some(ref message) = self.fail_with {
                return Err(RetrievalError::Store(message.clone()));
            }
            Ok(self.documents.iter().take(limit).cloned().collect())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}
