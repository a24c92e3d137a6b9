//! Tool framework for model capabilities.
//!
//! This module defines the [`Tool`] trait that every tool offered to the
//! model implements, and the [`ToolRegistry`] the conversation loop
//! dispatches through.
//!
//! # Example
//!
//! ```rust,ignore
//! use kdesk_agent::{Tool, ToolContext, ToolResult, ToolRegistry};
//!
//! struct Clock;
//!
//! #[async_trait]
//! impl Tool for Clock {
//!     fn name(&self) -> &str { "clock" }
//!     fn description(&self) -> &str { "Current office time" }
//!     fn parameters(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
//!         Ok(ToolResult::text("09:00"))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Clock);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::types::{SessionId, TurnId};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for tool parameter validation failures.
///
/// Messages are written for the model: they say what was wrong and how to
/// call the tool correctly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterValidationError {
    /// A required parameter is missing.
    #[error("missing required parameter '{name}': {hint}")]
    MissingRequired {
        name: &'static str,
        hint: &'static str,
    },

    /// A parameter has an invalid type.
    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// A parameter value is out of range.
    #[error("'{name}' value {value} is out of range: {constraint}")]
    OutOfRange {
        name: &'static str,
        value: String,
        constraint: String,
    },

    /// A parameter value doesn't match an expected pattern or enum.
    #[error("'{name}' has invalid value '{value}': {message}")]
    InvalidValue {
        name: &'static str,
        value: String,
        message: String,
    },
}

impl ParameterValidationError {
    pub fn missing(name: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { name, hint }
    }

    pub fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: actual.into(),
        }
    }

    pub fn out_of_range(
        name: &'static str,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            name,
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    pub fn invalid_value(
        name: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            message: message.into(),
        }
    }

    /// The parameter this error is about.
    pub fn parameter_name(&self) -> &str {
        match self {
            Self::MissingRequired { name, .. }
            | Self::InvalidType { name, .. }
            | Self::OutOfRange { name, .. }
            | Self::InvalidValue { name, .. } => name,
        }
    }
}

impl From<ParameterValidationError> for AgentError {
    fn from(err: ParameterValidationError) -> Self {
        AgentError::InvalidToolParams(err.to_string())
    }
}

/// Result type for parameter validation.
pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Helper trait for extracting and validating parameters from JSON.
pub trait ParamExt {
    /// Get a required string parameter.
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str>;

    /// Get an optional string parameter. Explicit `null` counts as absent.
    fn optional_str(&self, name: &'static str) -> ParamResult<Option<&str>>;

    /// Get an optional non-negative integer parameter. Explicit `null` counts
    /// as absent.
    fn optional_u64(&self, name: &'static str) -> ParamResult<Option<u64>>;
}

impl ParamExt for Value {
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str> {
        match self.get(name) {
            None | Some(Value::Null) => Err(ParameterValidationError::missing(name, hint)),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ParameterValidationError::invalid_type(
                name,
                "string",
                json_type(other),
            )),
        }
    }

    fn optional_str(&self, name: &'static str) -> ParamResult<Option<&str>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(ParameterValidationError::invalid_type(
                name,
                "string",
                json_type(other),
            )),
        }
    }

    fn optional_u64(&self, name: &'static str) -> ParamResult<Option<u64>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                // Models sometimes send `2.0` for an integer field.
                if let Some(v) = n.as_u64() {
                    Ok(Some(v))
                } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0) {
                    Ok(Some(f as u64))
                } else {
                    Err(ParameterValidationError::invalid_value(
                        name,
                        n.to_string(),
                        "expected a non-negative integer",
                    ))
                }
            }
            Some(other) => Err(ParameterValidationError::invalid_type(
                name,
                "integer",
                json_type(other),
            )),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for model-callable tools.
///
/// Each tool describes its parameters as a JSON Schema and runs
/// asynchronously.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model calls the tool by.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input.
    fn parameters(&self) -> Value;

    /// Execute the tool.
    ///
    /// Failures the model can act on are returned as
    /// [`ToolResult::Error`]; `Err` is for failures of the tool itself.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: SessionId,
    pub turn_id: TurnId,
    /// Cancelled when the turn is aborted.
    pub cancellation: CancellationToken,
    pub tool_call_id: Option<String>,
}

impl ToolContext {
    pub fn new(session_id: SessionId, turn_id: TurnId) -> Self {
        Self::with_cancellation(session_id, turn_id, CancellationToken::new())
    }

    pub fn with_cancellation(
        session_id: SessionId,
        turn_id: TurnId,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            turn_id,
            cancellation,
            tool_call_id: None,
        }
    }

    pub fn for_call(mut self, tool_call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(SessionId::new(), TurnId::new())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    /// Successful text output.
    Text { content: String },
    /// Successful JSON output.
    Json { content: Value },
    /// Tool execution failed.
    Error {
        message: String,
        /// Whether the model can usefully try again.
        recoverable: bool,
    },
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn json(content: Value) -> Self {
        Self::Json { content }
    }

    /// Create a recoverable error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            recoverable: true,
        }
    }

    /// Create a non-recoverable error result.
    pub fn fatal_error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            recoverable: false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// The content as a string for the model.
    pub fn to_llm_content(&self) -> String {
        match self {
            Self::Text { content } => content.clone(),
            Self::Json { content } => content.to_string(),
            Self::Error { message, .. } => format!("Error: {}", message),
        }
    }

    /// The value carried by a `tool-output-available` frame, or the error
    /// text for `tool-output-error`.
    pub fn into_output(self) -> std::result::Result<Value, String> {
        match self {
            Self::Text { content } => Ok(Value::String(content)),
            Self::Json { content } => Ok(content),
            Self::Error { message, .. } => Err(message),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of the tools offered to the model.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions for a completion request, sorted by name so that
    /// requests are reproducible.
    pub fn to_llm_definitions(&self) -> Vec<kdesk_llm::ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                kdesk_llm::ToolDefinition::new(tool.name(), tool.description(), tool.parameters())
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        tool.execute(params, ctx).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A mock tool for testing.
///
/// Returns a configurable response and records the parameters of every call.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    name: String,
    response: std::sync::Mutex<Option<ToolResult>>,
    calls: std::sync::Mutex<Vec<Value>>,
    wait_for_cancel: bool,
}

#[cfg(test)]
impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: std::sync::Mutex::new(None),
            calls: std::sync::Mutex::new(Vec::new()),
            wait_for_cancel: false,
        }
    }

    pub fn with_response(self, response: ToolResult) -> Self {
        *self.response.lock().unwrap() = Some(response);
        self
    }

    /// Block every call until the turn is cancelled.
    pub fn waiting_for_cancel(mut self) -> Self {
        self.wait_for_cancel = true;
        self
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A mock tool for testing"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        self.calls.lock().unwrap().push(params);

        if self.wait_for_cancel {
            ctx.cancellation.cancelled().await;
            return Err(AgentError::Cancelled);
        }

        Ok(self
            .response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ToolResult::text("mock response")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
