//! Start command - launches the kdesk server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;

use kdesk_agent::WebSearchTool;
use kdesk_config::{EmbeddingConfig, KdeskConfig, RetrievalConfig};
use kdesk_llm::{OpenAiEmbedder, OpenAiEmbedderConfig};
use kdesk_retrieval::{QdrantConfig, QdrantStore, RetrievalOrchestrator, RetrievalSettings};
use kdesk_server::{AppState, Server};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file and environment values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Qdrant collection to search (overrides config)
    #[arg(long)]
    pub collection: Option<String>,
}

impl StartArgs {
    fn apply(self, config: &mut KdeskConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(collection) = self.collection {
            config.retrieval.collection = collection;
        }
    }
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let mut config = loaded.config;
    args.apply(&mut config);

    match &loaded.source {
        Some(path) => tracing::info!(path = %path.display(), "loaded config file"),
        None => tracing::info!("no config file found, using defaults"),
    }

    let timeout = Duration::from_secs(config.retrieval.request_timeout_secs);
    let embedder = build_embedder(&config.embedding, timeout)?;
    let store = build_store(&config.retrieval, timeout)?;
    let settings = RetrievalSettings {
        top_k: config.retrieval.top_k,
        relevance_threshold: config.retrieval.relevance_threshold,
        max_attempts: config.retrieval.max_attempts,
    };
    tracing::info!(
        qdrant = %config.retrieval.qdrant_url,
        collection = %config.retrieval.collection,
        embedding_model = %config.embedding.model,
        top_k = settings.top_k,
        threshold = settings.relevance_threshold,
        "retrieval ready"
    );
    let orchestrator =
        RetrievalOrchestrator::with_settings(Arc::new(embedder), Arc::new(store), settings);

    let web_search = config.session.web_search.clone();
    let mut state = AppState::new(config, orchestrator);
    if let Some(key) = web_search {
        state = state.with_web_search(WebSearchTool::tavily(key)?);
        tracing::info!("web search tool enabled");
    }

    Server::new(state).run().await?;
    Ok(())
}

fn build_embedder(config: &EmbeddingConfig, timeout: Duration) -> Result<OpenAiEmbedder> {
    let api_key = config.api_key.clone().context(
        "no embedding API key: set OPENAI_API_KEY or [embedding].api_key in kdesk.toml",
    )?;
    let mut embedder_config = OpenAiEmbedderConfig::new(api_key)
        .with_base_url(&config.base_url)
        .with_model(&config.model)
        .with_timeout(timeout);
    if let Some(dimensions) = config.dimensions {
        embedder_config = embedder_config.with_dimensions(dimensions);
    }
    Ok(OpenAiEmbedder::new(embedder_config)?)
}

fn build_store(config: &RetrievalConfig, timeout: Duration) -> Result<QdrantStore> {
    let mut store_config =
        QdrantConfig::new(&config.qdrant_url, &config.collection).with_timeout(timeout);
    if let Some(key) = &config.qdrant_api_key {
        store_config = store_config.with_api_key(key);
    }
    Ok(QdrantStore::new(store_config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let mut config = KdeskConfig::default();
        StartArgs {
            port: Some(8088),
            bind: Some("0.0.0.0".into()),
            collection: None,
        }
        .apply(&mut config);
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.retrieval.collection, "qna_chats");
    }

    #[test]
    fn test_embedder_requires_key() {
        let err = build_embedder(&EmbeddingConfig::default(), Duration::from_secs(5)).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let config = EmbeddingConfig {
            api_key: Some("sk-test".into()),
            dimensions: Some(512),
            ..EmbeddingConfig::default()
        };
        assert!(build_embedder(&config, Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_store_from_config() {
        let config = RetrievalConfig {
            qdrant_api_key: Some("qd-key".into()),
            ..RetrievalConfig::default()
        };
        let store = build_store(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(store.collection(), "qna_chats");
    }
}
