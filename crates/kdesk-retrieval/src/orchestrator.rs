//! One retrieval attempt: rewrite, embed, search, classify.

use serde::{Deserialize, Serialize};

use kdesk_llm::SharedEmbedder;

use crate::document::RetrievedDocument;
use crate::error::{Result, RetrievalError};
use crate::relevance::RelevanceFilter;
use crate::store::SharedVectorStore;
use crate::strategy::{SearchStrategy, SearchStrategyPlanner};

/// Tunables for a retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    /// Documents requested from the store per attempt.
    pub top_k: usize,
    /// Score a document must exceed to count as relevant.
    pub relevance_threshold: f64,
    /// Attempts after which no further strategies are suggested.
    pub max_attempts: u32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            relevance_threshold: RelevanceFilter::DEFAULT_THRESHOLD,
            max_attempts: 4,
        }
    }
}

/// Outcome of one attempt, serialized as the tool output the model sees.
///
/// `results` carries every returned document, relevant or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub search_query: String,
    pub search_strategy: SearchStrategy,
    pub attempt_number: u32,
    pub total_results: usize,
    pub relevant_results: usize,
    pub results: Vec<RetrievedDocument>,
    pub has_relevant_info: bool,
    pub suggestions: Vec<String>,
}

/// Composes planner, embedder, store and relevance filter.
///
/// Holds no per-conversation state; the caller supplies strategy and attempt
/// number on every call.
pub struct RetrievalOrchestrator {
    embedder: SharedEmbedder,
    store: SharedVectorStore,
    planner: SearchStrategyPlanner,
    filter: RelevanceFilter,
    settings: RetrievalSettings,
}

impl RetrievalOrchestrator {
    pub fn new(embedder: SharedEmbedder, store: SharedVectorStore) -> Self {
        Self::with_settings(embedder, store, RetrievalSettings::default())
    }

    pub fn with_settings(
        embedder: SharedEmbedder,
        store: SharedVectorStore,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            planner: SearchStrategyPlanner::new(),
            filter: RelevanceFilter::new(settings.relevance_threshold),
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Run one attempt.
    ///
    /// `strategy` defaults to [`SearchStrategy::Direct`] and `attempt` to 1.
    /// An empty result set is a normal outcome; only embedding and store
    /// failures are errors.
    pub async fn search(
        &self,
        prompt: &str,
        strategy: Option<SearchStrategy>,
        attempt: Option<u32>,
    ) -> Result<SearchResult> {
        if prompt.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "prompt must not be empty".to_string(),
            ));
        }

        let strategy = strategy.unwrap_or_default();
        let attempt = attempt.unwrap_or(1);

        let search_query = self.planner.transform(prompt, strategy);
        tracing::debug!(
            %strategy,
            attempt,
            query = %search_query,
            "retrieval attempt"
        );

        let vector = self.embedder.embed(&search_query).await?;
        let results = self.store.search(&vector, self.settings.top_k).await?;

        let relevant_results = self.filter.count_relevant(&results);
        let suggestions = if attempt < self.settings.max_attempts {
            self.planner.suggestions(prompt, &[strategy])
        } else {
            Vec::new()
        };

        tracing::debug!(
            total = results.len(),
            relevant = relevant_results,
            store = self.store.name(),
            "retrieval attempt complete"
        );

        Ok(SearchResult {
            search_query,
            search_strategy: strategy,
            attempt_number: attempt,
            total_results: results.len(),
            relevant_results,
            results,
            has_relevant_info: relevant_results > 0,
            suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kdesk_llm::MockEmbedder;
    use serde_json::json;

    use super::*;
    use crate::store::MockVectorStore;

    const PROMPT: &str = "legalisir ijazah biaya dan cara di KDEI Taipei";

    fn sample_docs() -> Vec<RetrievedDocument> {
        vec![
            RetrievedDocument::new(695u64, 6, 0.70186156, json!({"turns": 1, "chat_id": 826})),
            RetrievedDocument::new(1417u64, 14, 0.6994894, json!({"turns": 2, "chat_id": 1823})),
            RetrievedDocument::new(1170u64, 11, 0.6994163, json!({"turns": 1, "chat_id": 1415})),
        ]
    }

    fn orchestrator(
        embedder: Arc<MockEmbedder>,
        store: Arc<MockVectorStore>,
    ) -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(embedder, store)
    }

    #[tokio::test]
    async fn test_first_direct_attempt_with_relevant_hits() {
        let embedder = Arc::new(MockEmbedder::new(8));
        let store = Arc::new(MockVectorStore::new(sample_docs()));
        let orchestrator = orchestrator(embedder.clone(), store.clone());

        let result = orchestrator
            .search(PROMPT, Some(SearchStrategy::Direct), Some(1))
            .await
            .unwrap();

        assert_eq!(result.search_query, PROMPT);
        assert_eq!(result.total_results, 3);
        assert_eq!(result.relevant_results, 3);
        assert!(result.has_relevant_info);
        assert_eq!(
            result.suggestions,
            vec![
                "Try searching with just the key terms",
                "Try using alternative terms or synonyms"
            ]
        );
        assert_eq!(embedder.calls(), vec![PROMPT.to_string()]);
        assert_eq!(store.limits(), vec![3]);
    }

    #[tokio::test]
    async fn test_last_attempt_has_no_suggestions() {
        let store = Arc::new(MockVectorStore::new(vec![RetrievedDocument::new(
            1u64,
            1,
            0.4,
            json!({}),
        )]));
        let orchestrator = orchestrator(Arc::new(MockEmbedder::new(8)), store);

        let result = orchestrator
            .search("jam buka kantor", Some(SearchStrategy::Simplified), Some(4))
            .await
            .unwrap();

        assert_eq!(result.relevant_results, 0);
        assert!(!result.has_relevant_info);
        assert!(result.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_keywords_query_is_embedded() {
        let embedder = Arc::new(MockEmbedder::new(8));
        let orchestrator = orchestrator(embedder.clone(), Arc::new(MockVectorStore::empty()));

        let result = orchestrator
            .search(PROMPT, Some(SearchStrategy::Keywords), Some(2))
            .await
            .unwrap();

        assert_eq!(result.search_query, "legalisir ijazah biaya cara kdei taipei");
        assert_eq!(embedder.calls(), vec![result.search_query.clone()]);
        // keywords was the current attempt, so it is not suggested again
        assert_eq!(result.suggestions[0], "Try using alternative terms or synonyms");
    }

    #[tokio::test]
    async fn test_empty_store_is_not_an_error() {
        let orchestrator = orchestrator(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(MockVectorStore::empty()),
        );
        let result = orchestrator.search("anything", None, None).await.unwrap();

        assert_eq!(result.search_strategy, SearchStrategy::Direct);
        assert_eq!(result.attempt_number, 1);
        assert_eq!(result.total_results, 0);
        assert!(!result.has_relevant_info);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates_without_search() {
        let store = Arc::new(MockVectorStore::new(sample_docs()));
        let orchestrator = orchestrator(
            Arc::new(MockEmbedder::failing("embedding quota exceeded")),
            store.clone(),
        );

        let err = orchestrator.search(PROMPT, None, None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let orchestrator = orchestrator(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(MockVectorStore::failing("connection refused")),
        );
        let err = orchestrator.search(PROMPT, None, None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Store(_)));
    }

    #[tokio::test]
    async fn test_blank_prompt_rejected() {
        let embedder = Arc::new(MockEmbedder::new(8));
        let orchestrator = orchestrator(embedder.clone(), Arc::new(MockVectorStore::empty()));
        let err = orchestrator.search("   ", None, None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidQuery(_)));
        assert!(embedder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_custom_settings() {
        let store = Arc::new(MockVectorStore::new(sample_docs()));
        let orchestrator = RetrievalOrchestrator::with_settings(
            Arc::new(MockEmbedder::new(8)),
            store.clone(),
            RetrievalSettings {
                top_k: 2,
                relevance_threshold: 0.7,
                max_attempts: 2,
            },
        );

        let result = orchestrator.search(PROMPT, None, Some(2)).await.unwrap();
        assert_eq!(store.limits(), vec![2]);
        assert_eq!(result.total_results, 2);
        assert_eq!(result.relevant_results, 1);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = SearchResult {
            search_query: "q".into(),
            search_strategy: SearchStrategy::Keywords,
            attempt_number: 2,
            total_results: 0,
            relevant_results: 0,
            results: vec![],
            has_relevant_info: false,
            suggestions: vec![],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "searchQuery": "q",
                "searchStrategy": "keywords",
                "attemptNumber": 2,
                "totalResults": 0,
                "relevantResults": 0,
                "results": [],
                "hasRelevantInfo": false,
                "suggestions": []
            })
        );
    }
}
