//! Score-threshold relevance classification.

use crate::document::RetrievedDocument;

/// Classifies documents as relevant when their score is strictly above a
/// fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFilter {
    threshold: f64,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl RelevanceFilter {
    /// Threshold used by the deployed Q&A collection.
    pub const DEFAULT_THRESHOLD: f64 = 0.6;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_relevant(&self, doc: &RetrievedDocument) -> bool {
        doc.score > self.threshold
    }

    /// Number of relevant documents.
    pub fn count_relevant(&self, docs: &[RetrievedDocument]) -> usize {
        docs.iter().filter(|d| self.is_relevant(d)).count()
    }

    /// Split into (relevant, irrelevant), preserving order within each side.
    pub fn partition<'a>(
        &self,
        docs: &'a [RetrievedDocument],
    ) -> (Vec<&'a RetrievedDocument>, Vec<&'a RetrievedDocument>) {
        docs.iter().partition(|d| self.is_relevant(d))
    }
}
