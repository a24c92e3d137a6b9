//! Web search through the Tavily API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::tool::{ParamExt, Tool, ToolContext, ToolResult};

pub const WEB_SEARCH_TOOL_NAME: &str = "webSearch";

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Configuration for web search.
#[derive(Clone)]
pub struct WebSearchConfig {
    pub api_key: String,
    /// Search endpoint, overridable for tests and proxies.
    pub endpoint: String,
    pub max_results: usize,
    pub timeout: Duration,
}

impl std::fmt::Debug for WebSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchConfig")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("max_results", &self.max_results)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl WebSearchConfig {
    pub fn tavily(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: TAVILY_SEARCH_URL.to_string(),
            max_results: 5,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// A single search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Tool for searching the web.
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    client: Client,
    config: WebSearchConfig,
}

impl WebSearchTool {
    pub fn new(config: WebSearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Create a Tavily-backed tool with default settings.
    pub fn tavily(api_key: impl Into<String>) -> Result<Self> {
        Self::new(WebSearchConfig::tavily(api_key))
    }

    async fn search(&self, query: &str) -> Result<Vec<WebSearchResult>> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&json!({
                "api_key": self.config.api_key,
                "query": query,
                "max_results": self.config.max_results
            }))
            .send()
            .await
            .map_err(|e| AgentError::tool(format!("Tavily search failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgentError::tool(format!(
                "Tavily search error: {}",
                response.status()
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| AgentError::tool(format!("Failed to parse response: {}", e)))?;

        let results = data["results"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|r| {
                        Some(WebSearchResult {
                            title: r["title"].as_str()?.to_string(),
                            url: r["url"].as_str()?.to_string(),
                            snippet: r["content"].as_str().unwrap_or("").to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns a list of relevant results with titles, URLs, and snippets."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let query = params.required_str("query", "provide a web search query")?;

        match self.search(query).await {
            Ok(results) => Ok(ToolResult::json(json!({
                "query": query,
                "results": results
            }))),
            Err(e) => {
                tracing::warn!(error = %e, "web search failed");
                Ok(ToolResult::error(format!("Search failed: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn tool_for(server: &MockServer) -> WebSearchTool {
        WebSearchTool::new(
            WebSearchConfig::tavily("tvly-test").with_endpoint(format!("{}/search", server.uri())),
        )
        .unwrap()
    }

    #[test]
    fn test_web_search_tool_metadata() {
        let tool = WebSearchTool::tavily("tvly-test").unwrap();
        assert_eq!(tool.name(), "webSearch");
        assert!(!tool.description().is_empty());
        assert!(tool.parameters()["properties"].get("query").is_some());
        assert!(!format!("{:?}", tool.config).contains("tvly-test"));
    }

    #[tokio::test]
    async fn test_search_maps_tavily_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({"api_key": "tvly-test", "query": "KDEI Taipei jam buka"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "KDEI Taipei jam buka",
                "results": [
                    {"title": "KDEI Taipei", "url": "https://kdei-taipei.org", "content": "Senin-Jumat 09.00"},
                    {"title": "No url"},
                    {"title": "Layanan", "url": "https://kdei-taipei.org/layanan"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = tool_for(&server).await;
        let result = tool
            .execute(json!({"query": "KDEI Taipei jam buka"}), &ToolContext::default())
            .await
            .unwrap();

        let output = result.into_output().unwrap();
        assert_eq!(output["query"], "KDEI Taipei jam buka");
        let results = output["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["snippet"], "Senin-Jumat 09.00");
        assert_eq!(results[1]["snippet"], "");
    }

    #[tokio::test]
    async fn test_search_http_error_is_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let tool = tool_for(&server).await;
        let result = tool
            .execute(json!({"query": "x"}), &ToolContext::default())
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.to_llm_content().contains("401"));
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid_params() {
        let tool = WebSearchTool::tavily("tvly-test").unwrap();
        let err = tool.execute(json!({}), &ToolContext::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolParams(_)));
    }
}
