//! Wire frames of the AI SDK v6 UI message stream.
//!
//! Only the subset the chat client consumes is modelled. Each frame
//! serializes to a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discrete unit of the outbound stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiFrame {
    // ========================================================================
    // Message lifecycle
    // ========================================================================
    /// First frame of every turn.
    Start,

    /// Marks the beginning of a model step.
    StartStep,

    /// Marks the end of a model step.
    FinishStep,

    /// Last frame of the turn before the `[DONE]` sentinel.
    Finish,

    // ========================================================================
    // Text parts
    // ========================================================================
    TextStart {
        id: String,
    },

    TextDelta {
        id: String,
        delta: String,
    },

    TextEnd {
        id: String,
    },

    // ========================================================================
    // Tool invocations
    // ========================================================================
    ToolInputStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
    },

    /// Raw JSON text fragment of the tool input. Not parseable on its own.
    ToolInputDelta {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "inputTextDelta")]
        input_text_delta: String,
    },

    ToolInputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: Value,
    },

    ToolOutputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        output: Value,
    },

    ToolOutputError {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "errorText")]
        error_text: String,
    },
}

impl UiFrame {
    pub fn text_start(id: impl Into<String>) -> Self {
        Self::TextStart { id: id.into() }
    }

    pub fn text_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    pub fn text_end(id: impl Into<String>) -> Self {
        Self::TextEnd { id: id.into() }
    }

    pub fn tool_input_start(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self::ToolInputStart {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
        }
    }

    pub fn tool_input_delta(tool_call_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::ToolInputDelta {
            tool_call_id: tool_call_id.into(),
            input_text_delta: delta.into(),
        }
    }

    pub fn tool_input_available(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: Value,
    ) -> Self {
        Self::ToolInputAvailable {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            input,
        }
    }

    pub fn tool_output_available(tool_call_id: impl Into<String>, output: Value) -> Self {
        Self::ToolOutputAvailable {
            tool_call_id: tool_call_id.into(),
            output,
        }
    }

    pub fn tool_output_error(tool_call_id: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self::ToolOutputError {
            tool_call_id: tool_call_id.into(),
            error_text: error_text.into(),
        }
    }

    /// The `type` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            UiFrame::Start => "start",
            UiFrame::StartStep => "start-step",
            UiFrame::FinishStep => "finish-step",
            UiFrame::Finish => "finish",
            UiFrame::TextStart { .. } => "text-start",
            UiFrame::TextDelta { .. } => "text-delta",
            UiFrame::TextEnd { .. } => "text-end",
            UiFrame::ToolInputStart { .. } => "tool-input-start",
            UiFrame::ToolInputDelta { .. } => "tool-input-delta",
            UiFrame::ToolInputAvailable { .. } => "tool-input-available",
            UiFrame::ToolOutputAvailable { .. } => "tool-output-available",
            UiFrame::ToolOutputError { .. } => "tool-output-error",
        }
    }

    /// Tool call id for tool frames.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            UiFrame::ToolInputStart { tool_call_id, .. }
            | UiFrame::ToolInputDelta { tool_call_id, .. }
            | UiFrame::ToolInputAvailable { tool_call_id, .. }
            | UiFrame::ToolOutputAvailable { tool_call_id, .. }
            | UiFrame::ToolOutputError { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unit_frames() {
        assert_eq!(serde_json::to_value(UiFrame::Start).unwrap(), json!({"type": "start"}));
        assert_eq!(
            serde_json::to_value(UiFrame::StartStep).unwrap(),
            json!({"type": "start-step"})
        );
        assert_eq!(
            serde_json::to_value(UiFrame::FinishStep).unwrap(),
            json!({"type": "finish-step"})
        );
        assert_eq!(serde_json::to_value(UiFrame::Finish).unwrap(), json!({"type": "finish"}));
    }

    #[test]
    fn test_text_frames() {
        assert_eq!(
            serde_json::to_value(UiFrame::text_delta("text-1", "Hal")).unwrap(),
            json!({"type": "text-delta", "id": "text-1", "delta": "Hal"})
        );
    }

    #[test]
    fn test_tool_frames_use_camel_case_fields() {
        assert_eq!(
            serde_json::to_value(UiFrame::tool_input_start("call_1", "getInformationTool")).unwrap(),
            json!({"type": "tool-input-start", "toolCallId": "call_1", "toolName": "getInformationTool"})
        );
        assert_eq!(
            serde_json::to_value(UiFrame::tool_input_delta("call_1", "{\"pro")).unwrap(),
            json!({"type": "tool-input-delta", "toolCallId": "call_1", "inputTextDelta": "{\"pro"})
        );
        assert_eq!(
            serde_json::to_value(UiFrame::tool_output_error("call_1", "boom")).unwrap(),
            json!({"type": "tool-output-error", "toolCallId": "call_1", "errorText": "boom"})
        );
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let frames = [
            UiFrame::Start,
            UiFrame::text_end("text-1"),
            UiFrame::tool_input_available("c", "t", json!({})),
            UiFrame::tool_output_available("c", json!([])),
        ];
        for frame in frames {
            let value = serde_json::to_value(&frame).unwrap();
            assert_eq!(value["type"], frame.kind());
        }
    }

    #[test]
    fn test_deserialize_client_frame() {
        let frame: UiFrame = serde_json::from_str(
            r#"{"type":"tool-input-available","toolCallId":"call_oW7H7fWxCFljHvDbogowUp03","toolName":"getInformationTool","input":{"prompt":"x"}}"#,
        )
        .unwrap();
        assert_eq!(frame.tool_call_id(), Some("call_oW7H7fWxCFljHvDbogowUp03"));
    }
}
