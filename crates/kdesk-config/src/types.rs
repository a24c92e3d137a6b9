//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]       # bind address, CORS, cookie policy
//! [retrieval]    # Qdrant endpoint, top-K, relevance threshold
//! [embedding]    # OpenAI-compatible embedding endpoint
//! [session]      # step budget, token limit, optional web search
//! [demo]         # scripted mock stream pacing
//! ```

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

pub mod defaults {
    pub const BIND: &str = "127.0.0.1";
    pub const PORT: u16 = 3000;
    pub const COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

    pub const QDRANT_URL: &str = "http://localhost:6333";
    pub const COLLECTION: &str = "qna_chats";
    pub const TOP_K: usize = 3;
    pub const RELEVANCE_THRESHOLD: f64 = 0.6;
    pub const MAX_ATTEMPTS: u32 = 4;
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    pub const EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
    pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

    pub const MAX_STEPS: usize = 5;
    pub const MAX_TOKENS: u32 = 4096;

    pub const DEMO_MIN_CHUNK: usize = 1;
    pub const DEMO_MAX_CHUNK: usize = 4;
    pub const DEMO_MAX_DELAY_MS: u64 = 3;
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every section is optional in the file; missing values take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdeskConfig {
    pub server: ServerConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub session: SessionConfig,
    pub demo: DemoConfig,
}

impl KdeskConfig {
    /// Create a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Allowed CORS origins. Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
    /// Mark credential cookies `Secure`.
    pub cookie_secure: bool,
    /// Lifetime of credential cookies.
    pub cookie_max_age_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::BIND.to_string(),
            port: defaults::PORT,
            cors_origins: Vec::new(),
            cookie_secure: false,
            cookie_max_age_secs: defaults::COOKIE_MAX_AGE_SECS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Retrieval
// ─────────────────────────────────────────────────────────────────────────────

/// Vector store and relevance settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Qdrant REST endpoint.
    pub qdrant_url: String,
    /// Qdrant API key, sent as the `api-key` header.
    pub qdrant_api_key: Option<String>,
    /// Collection holding the Q&A chat pairs.
    pub collection: String,
    /// Number of nearest documents fetched per attempt.
    pub top_k: usize,
    /// Documents scoring strictly above this count as relevant.
    pub relevance_threshold: f64,
    /// Attempt number at which suggestions stop being offered.
    pub max_attempts: u32,
    /// Timeout for each store request.
    pub request_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            qdrant_url: defaults::QDRANT_URL.to_string(),
            qdrant_api_key: None,
            collection: defaults::COLLECTION.to_string(),
            top_k: defaults::TOP_K,
            relevance_threshold: defaults::RELEVANCE_THRESHOLD,
            max_attempts: defaults::MAX_ATTEMPTS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding service settings. Process-wide, unlike the chat model
/// credentials which arrive per request.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Requested output dimensions, if the model supports truncation.
    pub dimensions: Option<usize>,
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::EMBEDDING_BASE_URL.to_string(),
            api_key: None,
            model: defaults::EMBEDDING_MODEL.to_string(),
            dimensions: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Per-turn model loop settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum model invocations per turn.
    pub max_steps: usize,
    /// Maximum tokens requested per model invocation.
    pub max_tokens: u32,
    /// Tavily API key. When set, the web search tool is offered to the model.
    pub web_search: Option<String>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("max_steps", &self.max_steps)
            .field("max_tokens", &self.max_tokens)
            .field("web_search", &self.web_search.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_steps: defaults::MAX_STEPS,
            max_tokens: defaults::MAX_TOKENS,
            web_search: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Demo
// ─────────────────────────────────────────────────────────────────────────────

/// Pacing of the scripted demo stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub min_chunk: usize,
    pub max_chunk: usize,
    pub max_delay_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            min_chunk: defaults::DEMO_MIN_CHUNK,
            max_chunk: defaults::DEMO_MAX_CHUNK,
            max_delay_ms: defaults::DEMO_MAX_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = KdeskConfig::from_toml("").unwrap();
        assert_eq!(config, KdeskConfig::default());
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.relevance_threshold, 0.6);
        assert_eq!(config.retrieval.collection, "qna_chats");
        assert_eq!(config.session.max_steps, 5);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
    }

    #[test]
    fn test_partial_section() {
        let config = KdeskConfig::from_toml(
            r#"
            [retrieval]
            top_k = 5
            relevance_threshold = 0.75

            [server]
            port = 8080
            cors_origins = ["http://localhost:5173"]
            "#,
        )
        .unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.relevance_threshold, 0.75);
        assert_eq!(config.retrieval.max_attempts, 4);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.cors_origins.len(), 1);
    }

    #[test]
    fn test_roundtrip_preserves_values() {
        let mut config = KdeskConfig::new();
        config.session.max_steps = 7;
        config.retrieval.qdrant_api_key = Some("qk".into());
        let parsed = KdeskConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = KdeskConfig::from_toml("[server\nport = ").unwrap_err();
        assert!(matches!(err, crate::ConfigError::Parse(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = KdeskConfig::new();
        config.embedding.api_key = Some("sk-embed".into());
        config.session.web_search = Some("tvly-key".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-embed"));
        assert!(!debug.contains("tvly-key"));
    }
}
