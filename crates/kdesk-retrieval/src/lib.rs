//! Retrieval over the Q&A chat collection.
//!
//! A search runs in four stages:
//!
//! ```text
//! prompt ──► SearchStrategyPlanner ──► Embedder ──► VectorStore ──► RelevanceFilter
//!            (rewrite query)           (vector)     (top-K docs)    (score > threshold)
//! ```
//!
//! [`RetrievalOrchestrator`] composes them into a single attempt. The model
//! drives further attempts itself, guided by the suggestions each result
//! carries.

pub mod document;
pub mod error;
pub mod orchestrator;
pub mod relevance;
pub mod store;
pub mod strategy;

pub use document::{PointId, RetrievedDocument};
pub use error::{Result, RetrievalError};
pub use orchestrator::{RetrievalOrchestrator, RetrievalSettings, SearchResult};
pub use relevance::RelevanceFilter;
pub use store::{QdrantConfig, QdrantStore, SharedVectorStore, VectorStore};
pub use strategy::{SearchStrategy, SearchStrategyPlanner};

#[cfg(any(test, feature = "testing"))]
pub use store::MockVectorStore;
