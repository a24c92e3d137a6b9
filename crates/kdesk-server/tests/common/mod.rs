//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use kdesk_config::{KdeskConfig, SessionCredentials};
use kdesk_llm::{LlmError, MockBackend, MockEmbedder, MockStep, SharedBackend};
use kdesk_retrieval::{MockVectorStore, RetrievalOrchestrator, RetrievedDocument};
use kdesk_server::{AppState, Server};

/// Credential cookies accepted by the test server.
pub const CREDENTIAL_COOKIES: &str =
    "baseURL=https%3A%2F%2Fapi.openai.com%2Fv1; apiKey=sk-test; model=gpt-4o-mini";

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// The scripted chat model behind every request.
    pub backend: Arc<MockBackend>,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server whose model answers with plain text.
    pub async fn start() -> Result<Self> {
        Self::start_with_steps(vec![MockStep::text("Halo! Ada yang bisa dibantu?")]).await
    }

    /// Start a server whose model replays `steps`.
    pub async fn start_with_steps(steps: Vec<MockStep>) -> Result<Self> {
        let addr = find_available_port().await?;
        let backend = Arc::new(MockBackend::new(steps));

        let orchestrator = RetrievalOrchestrator::new(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(MockVectorStore::new(sample_documents())),
        );

        let mut config = KdeskConfig::default();
        config.demo.max_delay_ms = 0;

        let factory_backend = backend.clone();
        let state = AppState::new(config, orchestrator).with_backend_factory(
            move |_: &SessionCredentials| -> Result<SharedBackend, LlmError> {
                Ok(factory_backend.clone())
            },
        );

        let server = Server::new(state);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            backend,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A POST request builder without cookies.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    /// A GET request builder without cookies.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    /// A chat request carrying valid credential cookies.
    pub fn chat(&self, body: serde_json::Value) -> reqwest::RequestBuilder {
        self.post("/api/chat")
            .header(reqwest::header::COOKIE, CREDENTIAL_COOKIES)
            .json(&body)
    }
}

/// A one-message conversation.
pub fn user_message(text: &str) -> serde_json::Value {
    json!({
        "id": "chat-1",
        "messages": [
            {"id": "m1", "role": "user", "parts": [{"type": "text", "text": text}]}
        ],
        "trigger": "submit-message"
    })
}

/// Documents the mock vector store returns for every query.
pub fn sample_documents() -> Vec<RetrievedDocument> {
    vec![
        RetrievedDocument::new(
            695u64,
            6,
            0.70186156,
            json!({"pair": "[q] biaya legalisir? [a] gratis", "turns": 1, "chat_id": 826}),
        ),
        RetrievedDocument::new(
            1417u64,
            14,
            0.6994894,
            json!({"pair": "[q] legalisir ijazah? [a] bawa asli", "turns": 2, "chat_id": 1823}),
        ),
        RetrievedDocument::new(
            1170u64,
            11,
            0.41,
            json!({"pair": "[q] paspor? [a] online", "turns": 1, "chat_id": 1415}),
        ),
    ]
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
