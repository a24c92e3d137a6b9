//! Application state shared across handlers.

use std::sync::Arc;

use kdesk_agent::{InformationTool, SessionSettings, ToolRegistry, WebSearchTool};
use kdesk_config::{KdeskConfig, SessionCredentials};
use kdesk_llm::{LlmError, OpenAiBackend, OpenAiConfig, SharedBackend};
use kdesk_retrieval::RetrievalOrchestrator;

/// Builds the chat model backend for a request's credentials.
///
/// Implemented for closures, so tests can hand out a scripted backend.
pub trait BackendFactory: Send + Sync {
    fn backend(&self, credentials: &SessionCredentials) -> Result<SharedBackend, LlmError>;
}

impl<F> BackendFactory for F
where
    F: Fn(&SessionCredentials) -> Result<SharedBackend, LlmError> + Send + Sync,
{
    fn backend(&self, credentials: &SessionCredentials) -> Result<SharedBackend, LlmError> {
        self(credentials)
    }
}

/// OpenAI-compatible backend pointed at the credentials' base URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiBackendFactory;

impl BackendFactory for OpenAiBackendFactory {
    fn backend(&self, credentials: &SessionCredentials) -> Result<SharedBackend, LlmError> {
        let config = OpenAiConfig::compatible(&credentials.base_url, &credentials.api_key)
            .with_model(&credentials.model);
        Ok(Arc::new(OpenAiBackend::new(config)?))
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<KdeskConfig>,

    /// Retrieval pipeline behind the information tool.
    pub orchestrator: Arc<RetrievalOrchestrator>,

    /// Web search tool, present when a Tavily key is configured.
    pub web_search: Option<Arc<WebSearchTool>>,

    /// Chat backend construction.
    pub backends: Arc<dyn BackendFactory>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: KdeskConfig, orchestrator: RetrievalOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            web_search: None,
            backends: Arc::new(OpenAiBackendFactory),
        }
    }

    /// Offer web search to the model.
    pub fn with_web_search(mut self, tool: WebSearchTool) -> Self {
        self.web_search = Some(Arc::new(tool));
        self
    }

    /// Replace how chat backends are built.
    pub fn with_backend_factory(mut self, factory: impl BackendFactory + 'static) -> Self {
        self.backends = Arc::new(factory);
        self
    }

    /// Tools offered to the model on every turn.
    pub fn tools(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(InformationTool::new(self.orchestrator.clone()));
        if let Some(web) = &self.web_search {
            registry.register_arc(web.clone());
        }
        registry
    }

    /// Model loop settings for a turn using `model`.
    pub fn session_settings(&self, model: &str) -> SessionSettings {
        let session = &self.config.session;
        SessionSettings::new(model)
            .with_max_steps(u32::try_from(session.max_steps).unwrap_or(u32::MAX))
            .with_max_tokens(session.max_tokens)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use kdesk_llm::{MockBackend, MockEmbedder};
    use kdesk_retrieval::{MockVectorStore, RetrievedDocument};
    use serde_json::json;

    use super::*;

    pub(crate) fn documents() -> Vec<RetrievedDocument> {
        vec![
            RetrievedDocument::new(695u64, 6, 0.70186156, json!({"pair": "[q] legalisir? [a] gratis", "turns": 1, "chat_id": 826})),
            RetrievedDocument::new(1417u64, 14, 0.45, json!({"pair": "[q] penyetaraan? [a] dikti", "turns": 2, "chat_id": 1823})),
        ]
    }

    /// State whose chat backend is always `backend`.
    pub(crate) fn state_with(backend: Arc<MockBackend>) -> AppState {
        let orchestrator = RetrievalOrchestrator::new(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(MockVectorStore::new(documents())),
        );
        AppState::new(KdeskConfig::default(), orchestrator).with_backend_factory(
            move |_: &SessionCredentials| -> Result<SharedBackend, LlmError> { Ok(backend.clone()) },
        )
    }
}
