//! Conversation loop for the kdesk support assistant.
//!
//! A [`ConversationStreamSession`] turns a chat request into a sequence of
//! model steps. Each step streams model output, runs the tools the model
//! asked for, and feeds the results into the next step. Everything the
//! client sees is emitted as [`TurnEvent`](kdesk_protocol::TurnEvent)s for
//! the protocol scheduler to frame.
//!
//! ```text
//!  ChatRequest ──► to_model_messages ──► ConversationStreamSession
//!                                              │
//!                     ┌────────────────────────┼───────────────────┐
//!                     ▼                        ▼                   ▼
//!               LlmBackend              ToolRegistry          TurnEvent tx
//!           (complete_stream)    (getInformationTool,        (to scheduler)
//!                                      webSearch)
//! ```

pub mod demo;
pub mod error;
pub mod prompt;
pub mod session;
pub mod tool;
pub mod tools;
pub mod types;
pub mod ui;

pub use demo::{DEMO_TOOL_CALL_ID, demo_turn_events};
pub use error::{AgentError, Result};
pub use prompt::{SUPPORT_SYSTEM_PROMPT, SystemPromptBuilder};
pub use session::{ConversationStreamSession, SessionSettings, TurnEventSender};
pub use tool::{ParameterValidationError, Tool, ToolContext, ToolRegistry, ToolResult};
pub use tools::{
    INFORMATION_TOOL_NAME, InformationTool, WEB_SEARCH_TOOL_NAME, WebSearchConfig, WebSearchTool,
};
pub use types::{Session, SessionId, Step, Turn, TurnId};
pub use ui::{ChatRequest, ModelConversation, Trigger, UiMessage, UiPart, UiRole, to_model_messages};
