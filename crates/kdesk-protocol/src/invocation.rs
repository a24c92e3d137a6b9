//! Tool invocation lifecycle.
//!
//! ```text
//! input-streaming ──► input-available ──► executing ──► output-available
//!        ┆                   │                 │
//!        └┄┄┄┄ cancel ┄┄┄┄┄┄┄┴─────────────────┴──────► output-error
//! ```
//!
//! Transitions only move forward. An error outcome needs input to be
//! available first; only cancellation may end an invocation that is still
//! streaming its input.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// Error text attached to invocations ended by cancellation.
pub const CANCELLED_ERROR_TEXT: &str = "Tool execution was cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    /// Internal bookkeeping only; has no frame of its own.
    Executing,
    OutputAvailable,
    OutputError,
}

impl ToolState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolState::OutputAvailable | ToolState::OutputError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolState::InputStreaming => "input-streaming",
            ToolState::InputAvailable => "input-available",
            ToolState::Executing => "executing",
            ToolState::OutputAvailable => "output-available",
            ToolState::OutputError => "output-error",
        }
    }
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to a tool, from the first input fragment to its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    call_id: String,
    tool_name: String,
    state: ToolState,
    raw_input: String,
    input: Option<Value>,
    output: Option<Value>,
    error_text: Option<String>,
}

impl ToolInvocation {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            state: ToolState::InputStreaming,
            raw_input: String::new(),
            input: None,
            output: None,
            error_text: None,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    /// Input text accumulated so far.
    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    pub fn error_text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Append a raw input fragment.
    pub fn push_input_delta(&mut self, delta: &str) -> Result<()> {
        self.expect_state(ToolState::InputStreaming, "append input")?;
        self.raw_input.push_str(delta);
        Ok(())
    }

    /// Parse the accumulated input text, if it is complete JSON yet.
    ///
    /// Empty input parses as `{}`: providers send no argument text for tools
    /// without parameters.
    pub fn parse_raw_input(&self) -> Option<Value> {
        if self.raw_input.trim().is_empty() {
            return Some(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.raw_input).ok()
    }

    /// Move to `input-available` using the accumulated text.
    ///
    /// Fails, leaving the state untouched, while the text does not parse.
    pub fn complete_input(&mut self) -> Result<&Value> {
        self.expect_state(ToolState::InputStreaming, "complete input")?;
        let parsed = self.parse_raw_input().ok_or_else(|| {
            ProtocolError::invariant(format!(
                "tool call {} input is not valid JSON yet",
                self.call_id
            ))
        })?;
        self.state = ToolState::InputAvailable;
        Ok(self.input.insert(parsed))
    }

    /// Move to `input-available` carrying the raw text as a JSON string.
    ///
    /// Used when the streamed input never became valid JSON, so the call can
    /// still reach `output-error` through `input-available`.
    pub fn complete_input_as_text(&mut self) -> Result<&Value> {
        self.expect_state(ToolState::InputStreaming, "complete input")?;
        self.state = ToolState::InputAvailable;
        Ok(self.input.insert(Value::String(self.raw_input.clone())))
    }

    /// Move to `input-available` with an already parsed input.
    ///
    /// When input fragments were received, `input` must be what they parse
    /// to, or the raw text itself when they never parsed.
    pub fn set_input(&mut self, input: Value) -> Result<()> {
        self.expect_state(ToolState::InputStreaming, "set input")?;
        if !self.raw_input.is_empty() {
            let expected = self
                .parse_raw_input()
                .unwrap_or_else(|| Value::String(self.raw_input.clone()));
            if input != expected {
                return Err(ProtocolError::invariant(format!(
                    "tool call {} input does not match its streamed text {:?}",
                    self.call_id, self.raw_input
                )));
            }
        }
        self.input = Some(input);
        self.state = ToolState::InputAvailable;
        Ok(())
    }

    pub fn start_executing(&mut self) -> Result<()> {
        self.expect_state(ToolState::InputAvailable, "start executing")?;
        self.state = ToolState::Executing;
        Ok(())
    }

    /// Attach the output. Allowed once input is available.
    pub fn complete(&mut self, output: Value) -> Result<()> {
        match self.state {
            ToolState::InputAvailable | ToolState::Executing => {
                self.output = Some(output);
                self.state = ToolState::OutputAvailable;
                Ok(())
            }
            other => Err(self.illegal(other, ToolState::OutputAvailable)),
        }
    }

    /// End the invocation with an error. Allowed once input is available.
    pub fn fail(&mut self, error_text: impl Into<String>) -> Result<()> {
        match self.state {
            ToolState::InputAvailable | ToolState::Executing => {
                self.set_error(error_text.into());
                Ok(())
            }
            other => Err(self.illegal(other, ToolState::OutputError)),
        }
    }

    /// Force a non-terminal invocation into `output-error` with the
    /// cancellation text. Returns `false` when it had already finished.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.set_error(CANCELLED_ERROR_TEXT.to_string());
        true
    }

    fn set_error(&mut self, error_text: String) {
        self.error_text = Some(error_text);
        self.state = ToolState::OutputError;
    }

    fn expect_state(&self, expected: ToolState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ProtocolError::invariant(format!(
                "cannot {action} for tool call {} in state {}",
                self.call_id, self.state
            )))
        }
    }

    fn illegal(&self, from: ToolState, to: ToolState) -> ProtocolError {
        ProtocolError::invariant(format!(
            "illegal transition {from} -> {to} for tool call {}",
            self.call_id
        ))
    }
}
