//! LLM backend trait and the scripted mock used in tests.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::types::{CompletionRequest, StopReason, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// Streaming Types
// ─────────────────────────────────────────────────────────────────────────────

/// A streaming response from an LLM backend.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'static>>;

/// Events emitted during streaming.
///
/// Tool calls are addressed by `index`, the provider's position of the call
/// within the response. Arguments arrive as raw JSON text fragments that only
/// parse once every fragment for that index has been seen.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Message started.
    MessageStart { id: String, model: String },
    /// Assistant text fragment.
    TextDelta(String),
    /// A tool call began.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },
    /// Fragment of a tool call's JSON arguments.
    ToolInputDelta { index: usize, partial_json: String },
    /// Message finished with final usage stats.
    MessageDelta {
        stop_reason: StopReason,
        usage: Usage,
    },
    /// Message complete.
    MessageStop,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for chat model providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Start a streaming completion.
    ///
    /// Errors returned here happen before any event is produced; errors
    /// inside the stream happen mid-response.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<ResponseStream>;

    /// Name of this backend, for logging.
    fn name(&self) -> &str;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockBackend, MockStep};

#[cfg(any(test, feature = "testing"))]
mod mock {
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;
    use crate::error::LlmError;

    /// One scripted model invocation.
    #[derive(Debug, Clone)]
    pub enum MockStep {
        /// Replay these events, then end the stream.
        Events(Vec<StreamEvent>),
        /// Fail before any event is produced.
        Fail(String),
        /// Replay these events, then yield a network error.
        FailAfter(Vec<StreamEvent>, String),
        /// Replay these events, then never produce another item.
        Stall(Vec<StreamEvent>),
    }

    impl MockStep {
        /// A step that streams `text` in one delta and ends the turn.
        pub fn text(text: impl Into<String>) -> Self {
            Self::text_chunks(&[&text.into()])
        }

        /// A step that streams the given text fragments and ends the turn.
        pub fn text_chunks(chunks: &[&str]) -> Self {
            let mut events = vec![start_event()];
            events.extend(chunks.iter().map(|c| StreamEvent::TextDelta(c.to_string())));
            events.extend(finish_events(StopReason::EndTurn));
            Self::Events(events)
        }

        /// A step that requests one tool call with the given input.
        pub fn tool_call(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
            let json = input.to_string();
            Self::tool_call_chunks(id, name, &[json.as_str()])
        }

        /// A step that requests one tool call whose arguments arrive in fragments.
        pub fn tool_call_chunks(
            id: impl Into<String>,
            name: impl Into<String>,
            chunks: &[&str],
        ) -> Self {
            let mut events = vec![
                start_event(),
                StreamEvent::ToolUseStart {
                    index: 0,
                    id: id.into(),
                    name: name.into(),
                },
            ];
            events.extend(chunks.iter().map(|c| StreamEvent::ToolInputDelta {
                index: 0,
                partial_json: c.to_string(),
            }));
            events.extend(finish_events(StopReason::ToolUse));
            Self::Events(events)
        }

        /// A step that streams some text and then requests a tool call.
        pub fn text_then_tool_call(
            text: impl Into<String>,
            id: impl Into<String>,
            name: impl Into<String>,
            input: Value,
        ) -> Self {
            let events = vec![
                start_event(),
                StreamEvent::TextDelta(text.into()),
                StreamEvent::ToolUseStart {
                    index: 0,
                    id: id.into(),
                    name: name.into(),
                },
                StreamEvent::ToolInputDelta {
                    index: 0,
                    partial_json: input.to_string(),
                },
            ]
            .into_iter()
            .chain(finish_events(StopReason::ToolUse))
            .collect();
            Self::Events(events)
        }
    }

    fn start_event() -> StreamEvent {
        StreamEvent::MessageStart {
            id: "mock_msg".to_string(),
            model: "mock-model".to_string(),
        }
    }

    fn finish_events(stop_reason: StopReason) -> [StreamEvent; 2] {
        [
            StreamEvent::MessageDelta {
                stop_reason,
                usage: Usage::new(10, 20),
            },
            StreamEvent::MessageStop,
        ]
    }

    /// A mock backend that replays scripted steps, one per request.
    ///
    /// Requests beyond the script fail with a backend error.
    pub struct MockBackend {
        name: String,
        steps: Mutex<Vec<MockStep>>,
        request_log: Mutex<Vec<CompletionRequest>>,
    }

    impl MockBackend {
        /// Create a new mock backend with the given steps.
        pub fn new(steps: Vec<MockStep>) -> Self {
            Self {
                name: "mock".to_string(),
                steps: Mutex::new(steps),
                request_log: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock backend with a single text response.
        pub fn with_text(text: impl Into<String>) -> Self {
            Self::new(vec![MockStep::text(text)])
        }

        /// Get all requests that were made to this backend.
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.request_log.lock().clone()
        }

        /// Get the number of requests made.
        pub fn request_count(&self) -> usize {
            self.request_log.lock().len()
        }
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        async fn complete_stream(&self, request: CompletionRequest) -> Result<ResponseStream> {
            self.request_log.lock().push(request);

            let step = {
                let mut steps = self.steps.lock();
                if steps.is_empty() {
                    return Err(LlmError::Backend(
                        "MockBackend: no more responses available".to_string(),
                    ));
                }
                steps.remove(0)
            };

            let stream: ResponseStream = match step {
                MockStep::Events(events) => {
                    Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
                }
                MockStep::Fail(message) => return Err(LlmError::Backend(message)),
                MockStep::FailAfter(events, message) => {
                    use futures::StreamExt;
                    let tail = futures::stream::once(async move { Err(LlmError::Network(message)) });
                    Box::pin(futures::stream::iter(events.into_iter().map(Ok)).chain(tail))
                }
                MockStep::Stall(events) => {
                    use futures::StreamExt;
                    Box::pin(
                        futures::stream::iter(events.into_iter().map(Ok))
                            .chain(futures::stream::pending()),
                    )
                }
            };
            Ok(stream)
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
