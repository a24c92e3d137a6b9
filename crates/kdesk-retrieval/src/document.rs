//! Documents returned by the vector store.

use serde::{Deserialize, Serialize};

/// Qdrant point identifier: an unsigned integer or a UUID string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        PointId::Num(n)
    }
}

/// One nearest-neighbour hit. Serialized exactly as the tool output carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: PointId,
    #[serde(default)]
    pub version: u64,
    /// Similarity score. A missing score counts as zero.
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RetrievedDocument {
    pub fn new(id: impl Into<PointId>, version: u64, score: f64, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            version,
            score,
            payload,
        }
    }
}
