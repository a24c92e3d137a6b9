//! Text embeddings for retrieval.
//!
//! [`Embedder`] turns a search query into a dense vector that the vector
//! store can compare against indexed Q&A pairs.
//!
//! # Implementations
//!
//! - [`OpenAiEmbedder`]: any OpenAI-compatible `/embeddings` endpoint
//! - `MockEmbedder`: deterministic vectors for tests (`testing` feature)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{LlmError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
///
/// Implementations hold no per-request state and are shared across
/// concurrent sessions.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the dimensionality of embeddings produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Get the name of this embedder.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for OpenAI embeddings.
#[derive(Clone)]
pub struct OpenAiEmbedderConfig {
    /// API key for authentication.
    pub api_key: Option<String>,
    /// Base URL for the API.
    pub base_url: String,
    /// Model to use for embeddings.
    pub model: String,
    /// Requested output dimensions (text-embedding-3 models only).
    pub dimensions: Option<usize>,
    /// Request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenAiEmbedderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OpenAiEmbedderConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request truncated output dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI embeddings API client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
    dimensions: usize,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("config", &self.config)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OpenAiEmbedder {
    /// Create a new OpenAI embedder.
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let dimensions = config.dimensions.unwrap_or(match config.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        });

        Ok(Self {
            client,
            config,
            dimensions,
        })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: text,
            dimensions: self.config.dimensions,
        };

        let mut builder = self.client.post(self.embeddings_url()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "Embedding request failed: HTTP {} - {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(format!("Failed to parse response: {}", e)))?;

        result
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::Internal("No embedding returned".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockEmbedder;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use parking_lot::Mutex;

    use super::*;

    /// A mock embedder for testing purposes.
    ///
    /// Generates deterministic embeddings from the text and records every
    /// input it was asked to embed.
    #[derive(Debug, Default)]
    pub struct MockEmbedder {
        dimensions: usize,
        fail_with: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockEmbedder {
        /// Create a new mock embedder with the specified dimensions.
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                ..Default::default()
            }
        }

        /// A mock embedder whose every call fails with a backend error.
        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                dimensions: 8,
                fail_with: Some(message.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Texts embedded so far, in call order.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.lock().push(text.to_string());
            if let Some(ref message) = self.fail_with {
                return Err(LlmError::Backend(message.clone()));
            }

            let mut state = simple_hash(text);
            let mut embedding: Vec<f32> = (0..self.dimensions)
                .map(|_| {
                    state = state.wrapping_mul(1103515245).wrapping_add(12345);
                    ((state >> 16) as f32 / 32768.0) - 1.0
                })
                .collect();

            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut embedding {
                    *x /= norm;
                }
            }

            Ok(embedding)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn simple_hash(s: &str) -> u64 {
        s.bytes()
            .fold(5381u64, |h, b| h.wrapping_mul(33).wrapping_add(b as u64))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_deterministic() {
        let embedder = MockEmbedder::new(16);
        let a = embedder.embed("legalisir ijazah").await.unwrap();
        let b = embedder.embed("legalisir ijazah").await.unwrap();
        let c = embedder.embed("jam operasional").await.unwrap();

        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(embedder.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_embedder_failing() {
        let embedder = MockEmbedder::failing("quota exceeded");
        let err = embedder.embed("x").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_openai_embedder_debug_redacts_key() {
        let embedder = OpenAiEmbedder::new(OpenAiEmbedderConfig::new("sk-secret")).unwrap();
        let debug = format!("{:?}", embedder);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_openai_embedder_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-embed"))
            .and(body_json(json!({
                "model": "text-embedding-3-small",
                "input": "biaya legalisir"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}],
                "model": "text-embedding-3-small"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(
            OpenAiEmbedderConfig::new("sk-embed").with_base_url(format!("{}/v1/", server.uri())),
        )
        .unwrap();

        let vector = embedder.embed("biaya legalisir").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[tokio::test]
    async fn test_openai_embedder_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let embedder =
            OpenAiEmbedder::new(OpenAiEmbedderConfig::new("k").with_base_url(server.uri()))
                .unwrap();
        let err = embedder.embed("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Backend(_)));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_configured_dimensions() {
        let embedder = OpenAiEmbedder::new(
            OpenAiEmbedderConfig::new("k")
                .with_model("text-embedding-3-large")
                .with_dimensions(256),
        )
        .unwrap();
        assert_eq!(embedder.dimensions(), 256);
    }
}
