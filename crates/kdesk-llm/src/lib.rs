//! Model and embedding clients for kdesk.
//!
//! The chat side is the [`LlmBackend`] trait: a streaming completion call
//! that yields [`StreamEvent`]s (text deltas, tool call starts, tool argument
//! deltas, finish). [`OpenAiBackend`] speaks the OpenAI-compatible
//! `/chat/completions` SSE protocol; [`MockBackend`] replays scripted steps.
//!
//! The embedding side is the [`Embedder`] trait with an OpenAI-compatible
//! implementation and a deterministic mock.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  LlmBackend                              │
//! │  - complete_stream() -> Stream<Event>    │
//! └──────────────────────────────────────────┘
//!            │                     │
//!            ▼                     ▼
//!   ┌───────────────┐     ┌─────────────┐
//!   │ OpenAiBackend │     │ MockBackend │
//!   └───────────────┘     └─────────────┘
//! ```

pub mod backend;
pub mod embeddings;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, ResponseStream, SharedBackend, StreamEvent};
pub use embeddings::{Embedder, OpenAiEmbedder, OpenAiEmbedderConfig, SharedEmbedder};
pub use error::{LlmError, Result};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use types::{
    CompletionRequest, ContentBlock, Message, Role, StopReason, ToolDefinition, Usage,
};

#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, MockStep};
#[cfg(any(test, feature = "testing"))]
pub use embeddings::MockEmbedder;
