//! Core types for the agent crate.
//!
//! - [`Session`]: the turns of one conversation, owned by its
//!   [`ConversationStreamSession`](crate::ConversationStreamSession)
//! - [`Turn`]: one assistant response cycle, made of steps
//! - [`Step`]: one model invocation and the tool calls it requested

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kdesk_llm::{StopReason, Usage};
use kdesk_protocol::{ToolInvocation, TurnStatus};

// ─────────────────────────────────────────────────────────────────────────────
// ID Types
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier for a session.
///
/// Opaque to the server: chat clients send their own conversation id, and a
/// random one is generated when they do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a turn within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    /// Create a new random turn ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Step
// ─────────────────────────────────────────────────────────────────────────────

/// One model invocation round.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// 1-based position within the turn.
    pub index: u32,
    /// Assistant text produced in this step.
    pub text: String,
    /// Tool calls in the order the model started them.
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: Usage,
    pub stop_reason: Option<StopReason>,
}

impl Step {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            text: String::new(),
            tool_calls: Vec::new(),
            usage: Usage::default(),
            stop_reason: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Whether every tool call reached a terminal state.
    pub fn tools_settled(&self) -> bool {
        self.tool_calls.iter().all(ToolInvocation::is_terminal)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn
// ─────────────────────────────────────────────────────────────────────────────

/// One assistant response cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: TurnId,
    pub steps: Vec<Step>,
    /// `None` while the turn is running.
    pub status: Option<TurnStatus>,
    /// Set when the turn errored.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Turn {
    pub fn new() -> Self {
        Self {
            id: TurnId::new(),
            steps: Vec::new(),
            status: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Record the terminal status.
    pub fn close(&mut self, status: TurnStatus, error: Option<String>) {
        self.status = Some(status);
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_some()
    }

    /// Concatenated assistant text across all steps.
    pub fn text(&self) -> String {
        self.steps.iter().map(|s| s.text.as_str()).collect()
    }

    /// Total token usage across all steps.
    pub fn usage(&self) -> Usage {
        self.steps.iter().fold(Usage::default(), |mut acc, s| {
            acc += s.usage;
            acc
        })
    }

    pub fn tool_call_count(&self) -> usize {
        self.steps.iter().map(|s| s.tool_calls.len()).sum()
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// The turns of one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
