//! Stateful frame validation and SSE encoding.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::error::{ProtocolError, Result};
use crate::frames::UiFrame;
use crate::invocation::{CANCELLED_ERROR_TEXT, ToolInvocation, ToolState};
use crate::sse;

/// Validates every frame against the structure of a turn before encoding it.
///
/// # Rules
///
/// - `start` comes first and exactly once; nothing but the sentinel follows `finish`
/// - steps do not nest; text and tool frames only appear inside a step
/// - a text id is started once, ended once, and deltas fall between the two
/// - tool frames follow the [`ToolInvocation`] lifecycle
/// - `tool-input-available` carries what the input deltas parse to
/// - a tool still streaming input can only end with the cancellation error
/// - `finish-step` requires every text part closed and every tool of the
///   step terminal; `finish` additionally requires the step to be closed
///
/// A rejected frame leaves the encoder unchanged.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    started: bool,
    finished: bool,
    done: bool,
    step_open: bool,
    steps: u32,
    open_text: HashSet<String>,
    used_text_ids: HashSet<String>,
    tools: HashMap<String, ToolInvocation>,
    /// Call ids in start order, for deterministic closing.
    tool_order: Vec<String>,
    frames: usize,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `frame`, update state and return its SSE line.
    pub fn encode(&mut self, frame: &UiFrame) -> Result<Bytes> {
        self.accept(frame)?;
        self.frames += 1;
        sse::frame_line(frame)
    }

    /// The terminal `[DONE]` line. Only valid once, after `finish`.
    pub fn done(&mut self) -> Result<Bytes> {
        if !self.finished {
            return Err(ProtocolError::invariant("sentinel before finish"));
        }
        if self.done {
            return Err(ProtocolError::invariant("sentinel already sent"));
        }
        self.done = true;
        Ok(Bytes::from_static(sse::DONE_LINE))
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn step_open(&self) -> bool {
        self.step_open
    }

    /// Steps started so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Frames accepted so far, excluding the sentinel.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Text part ids currently open, sorted.
    pub fn open_text_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.open_text.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Non-terminal tool calls in the order they started.
    pub fn open_tool_calls(&self) -> Vec<String> {
        self.tool_order
            .iter()
            .filter(|id| self.tools.get(*id).is_some_and(|t| !t.is_terminal()))
            .cloned()
            .collect()
    }

    pub fn tool(&self, call_id: &str) -> Option<&ToolInvocation> {
        self.tools.get(call_id)
    }

    /// Record that a tool began executing. Emits nothing.
    pub fn mark_executing(&mut self, call_id: &str) -> Result<()> {
        self.tool_mut(call_id)?.start_executing()
    }

    fn accept(&mut self, frame: &UiFrame) -> Result<()> {
        if self.finished {
            return Err(ProtocolError::invariant(format!(
                "{} after finish",
                frame.kind()
            )));
        }
        if !self.started && *frame != UiFrame::Start {
            return Err(ProtocolError::invariant(format!(
                "{} before start",
                frame.kind()
            )));
        }

        match frame {
            UiFrame::Start => {
                if self.started {
                    return Err(ProtocolError::invariant("duplicate start"));
                }
                self.started = true;
            }
            UiFrame::StartStep => {
                if self.step_open {
                    return Err(ProtocolError::invariant("start-step inside an open step"));
                }
                self.step_open = true;
                self.steps += 1;
            }
            UiFrame::FinishStep => {
                self.require_step(frame)?;
                self.require_closed_parts(frame)?;
                self.step_open = false;
            }
            UiFrame::Finish => {
                if self.step_open {
                    return Err(ProtocolError::invariant("finish inside an open step"));
                }
                self.require_closed_parts(frame)?;
                self.finished = true;
            }
            UiFrame::TextStart { id } => {
                self.require_step(frame)?;
                if self.used_text_ids.contains(id) {
                    return Err(ProtocolError::invariant(format!(
                        "text part {id} started twice"
                    )));
                }
                self.used_text_ids.insert(id.clone());
                self.open_text.insert(id.clone());
            }
            UiFrame::TextDelta { id, .. } => {
                self.require_step(frame)?;
                if !self.open_text.contains(id) {
                    return Err(ProtocolError::invariant(format!(
                        "text-delta for part {id} which is not open"
                    )));
                }
            }
            UiFrame::TextEnd { id } => {
                if !self.open_text.remove(id) {
                    return Err(ProtocolError::invariant(format!(
                        "text-end for part {id} which is not open"
                    )));
                }
            }
            UiFrame::ToolInputStart {
                tool_call_id,
                tool_name,
            } => {
                self.require_step(frame)?;
                if self.tools.contains_key(tool_call_id) {
                    return Err(ProtocolError::invariant(format!(
                        "tool call {tool_call_id} started twice"
                    )));
                }
                self.tools.insert(
                    tool_call_id.clone(),
                    ToolInvocation::new(tool_call_id.clone(), tool_name.clone()),
                );
                self.tool_order.push(tool_call_id.clone());
            }
            UiFrame::ToolInputDelta {
                tool_call_id,
                input_text_delta,
            } => {
                self.require_step(frame)?;
                self.tool_mut(tool_call_id)?
                    .push_input_delta(input_text_delta)?;
            }
            UiFrame::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                self.require_step(frame)?;
                let tool = self.tool_mut(tool_call_id)?;
                if tool.tool_name() != tool_name {
                    return Err(ProtocolError::invariant(format!(
                        "tool call {tool_call_id} changed name from {} to {tool_name}",
                        tool.tool_name()
                    )));
                }
                tool.set_input(input.clone())?;
            }
            UiFrame::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                self.require_step(frame)?;
                self.tool_mut(tool_call_id)?.complete(output.clone())?;
            }
            UiFrame::ToolOutputError {
                tool_call_id,
                error_text,
            } => {
                self.require_step(frame)?;
                let tool = self.tool_mut(tool_call_id)?;
                if tool.state() == ToolState::InputStreaming && error_text == CANCELLED_ERROR_TEXT
                {
                    tool.cancel();
                } else {
                    tool.fail(error_text.clone())?;
                }
            }
        }
        Ok(())
    }

    fn require_step(&self, frame: &UiFrame) -> Result<()> {
        if self.step_open {
            Ok(())
        } else {
            Err(ProtocolError::invariant(format!(
                "{} outside of a step",
                frame.kind()
            )))
        }
    }

    fn require_closed_parts(&self, frame: &UiFrame) -> Result<()> {
        if !self.open_text.is_empty() {
            return Err(ProtocolError::invariant(format!(
                "{} with open text parts {:?}",
                frame.kind(),
                self.open_text_ids()
            )));
        }
        let open_tools = self.open_tool_calls();
        if !open_tools.is_empty() {
            return Err(ProtocolError::invariant(format!(
                "{} with unfinished tool calls {:?}",
                frame.kind(),
                open_tools
            )));
        }
        Ok(())
    }

    fn tool_mut(&mut self, call_id: &str) -> Result<&mut ToolInvocation> {
        self.tools
            .get_mut(call_id)
            .ok_or_else(|| ProtocolError::invariant(format!("unknown tool call {call_id}")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn started() -> FrameEncoder {
        let mut enc = FrameEncoder::new();
        enc.encode(&UiFrame::Start).unwrap();
        enc.encode(&UiFrame::StartStep).unwrap();
        enc
    }

    #[test]
    fn test_well_formed_turn() {
        let mut enc = FrameEncoder::new();
        let frames = [
            UiFrame::Start,
            UiFrame::StartStep,
            UiFrame::tool_input_start("call_1", "getInformationTool"),
            UiFrame::tool_input_delta("call_1", r#"{"prompt":"#),
            UiFrame::tool_input_delta("call_1", r#""x"}"#),
            UiFrame::tool_input_available("call_1", "getInformationTool", json!({"prompt": "x"})),
            UiFrame::tool_output_available("call_1", json!({"totalResults": 0})),
            UiFrame::FinishStep,
            UiFrame::StartStep,
            UiFrame::text_start("text-1"),
            UiFrame::text_delta("text-1", "Halo"),
            UiFrame::text_end("text-1"),
            UiFrame::FinishStep,
            UiFrame::Finish,
        ];
        for frame in &frames {
            enc.encode(frame).unwrap();
        }
        let done = enc.done().unwrap();

        assert_eq!(&done[..], b"data: [DONE]\n\n");
        assert_eq!(enc.steps(), 2);
        assert_eq!(enc.frame_count(), frames.len());
        assert_eq!(enc.tool("call_1").unwrap().state(), ToolState::OutputAvailable);
    }

    #[test]
    fn test_encode_produces_data_line() {
        let mut enc = FrameEncoder::new();
        let line = enc.encode(&UiFrame::Start).unwrap();
        assert_eq!(&line[..], b"data: {\"type\":\"start\"}\n\n");
    }

    #[test]
    fn test_start_must_come_first_and_once() {
        let mut enc = FrameEncoder::new();
        assert!(enc.encode(&UiFrame::StartStep).is_err());
        enc.encode(&UiFrame::Start).unwrap();
        assert!(enc.encode(&UiFrame::Start).is_err());
    }

    #[test]
    fn test_text_delta_requires_open_part() {
        let mut enc = started();
        assert!(enc.encode(&UiFrame::text_delta("text-1", "x")).is_err());
        enc.encode(&UiFrame::text_start("text-1")).unwrap();
        enc.encode(&UiFrame::text_delta("text-1", "x")).unwrap();
        enc.encode(&UiFrame::text_end("text-1")).unwrap();
        assert!(enc.encode(&UiFrame::text_delta("text-1", "y")).is_err());
        assert!(enc.encode(&UiFrame::text_end("text-1")).is_err());
        assert!(enc.encode(&UiFrame::text_start("text-1")).is_err());
    }

    #[test]
    fn test_content_outside_step_rejected() {
        let mut enc = FrameEncoder::new();
        enc.encode(&UiFrame::Start).unwrap();
        assert!(enc.encode(&UiFrame::text_start("text-1")).is_err());
        assert!(enc.encode(&UiFrame::tool_input_start("c", "t")).is_err());
    }

    #[test]
    fn test_steps_do_not_nest() {
        let mut enc = started();
        assert!(enc.encode(&UiFrame::StartStep).is_err());
    }

    #[test]
    fn test_finish_step_waits_for_tool_outcome() {
        let mut enc = started();
        enc.encode(&UiFrame::tool_input_start("call_1", "t")).unwrap();
        enc.encode(&UiFrame::tool_input_available("call_1", "t", json!({}))).unwrap();
        enc.mark_executing("call_1").unwrap();

        let err = enc.encode(&UiFrame::FinishStep).unwrap_err();
        assert!(err.to_string().contains("call_1"));
        assert!(enc.step_open());

        enc.encode(&UiFrame::tool_output_error("call_1", "boom")).unwrap();
        enc.encode(&UiFrame::FinishStep).unwrap();
    }

    #[test]
    fn test_finish_step_requires_closed_text() {
        let mut enc = started();
        enc.encode(&UiFrame::text_start("text-1")).unwrap();
        assert!(enc.encode(&UiFrame::FinishStep).is_err());
        assert_eq!(enc.open_text_ids(), vec!["text-1"]);
    }

    #[test]
    fn test_tool_output_once() {
        let mut enc = started();
        enc.encode(&UiFrame::tool_input_start("call_1", "t")).unwrap();
        assert!(enc.encode(&UiFrame::tool_output_available("call_1", json!(1))).is_err());
        enc.encode(&UiFrame::tool_input_available("call_1", "t", json!({}))).unwrap();
        enc.encode(&UiFrame::tool_output_available("call_1", json!(1))).unwrap();
        assert!(enc.encode(&UiFrame::tool_output_error("call_1", "x")).is_err());
        assert!(enc.encode(&UiFrame::tool_input_delta("call_1", "x")).is_err());
    }

    #[test]
    fn test_cancelled_streaming_tool_may_error() {
        let mut enc = started();
        enc.encode(&UiFrame::tool_input_start("call_1", "t")).unwrap();
        enc.encode(&UiFrame::tool_input_delta("call_1", "{")).unwrap();
        assert_eq!(enc.open_tool_calls(), vec!["call_1"]);
        enc.encode(&UiFrame::tool_output_error("call_1", "Tool execution was cancelled"))
            .unwrap();
        assert!(enc.open_tool_calls().is_empty());
    }

    #[test]
    fn test_input_available_must_match_deltas() {
        let mut enc = started();
        enc.encode(&UiFrame::tool_input_start("call_1", "t")).unwrap();
        enc.encode(&UiFrame::tool_input_delta("call_1", r#"{"prompt":"#)).unwrap();

        let err = enc
            .encode(&UiFrame::tool_input_available("call_1", "t", json!({"prompt": "y"})))
            .unwrap_err();
        assert!(err.to_string().contains("call_1"));
        assert_eq!(enc.tool("call_1").unwrap().state(), ToolState::InputStreaming);

        enc.encode(&UiFrame::tool_input_delta("call_1", r#""x"}"#)).unwrap();
        assert!(
            enc.encode(&UiFrame::tool_input_available("call_1", "t", json!({"prompt": "y"})))
                .is_err()
        );
        enc.encode(&UiFrame::tool_input_available("call_1", "t", json!({"prompt": "x"})))
            .unwrap();
    }

    #[test]
    fn test_streaming_tool_error_needs_input_first() {
        let mut enc = started();
        enc.encode(&UiFrame::tool_input_start("call_1", "t")).unwrap();
        enc.encode(&UiFrame::tool_input_delta("call_1", r#"{"prompt": "#)).unwrap();
        assert!(enc.encode(&UiFrame::tool_output_error("call_1", "Invalid JSON input")).is_err());
        assert_eq!(enc.open_tool_calls(), vec!["call_1"]);

        enc.encode(&UiFrame::tool_input_available("call_1", "t", json!(r#"{"prompt": "#)))
            .unwrap();
        enc.encode(&UiFrame::tool_output_error("call_1", "Invalid JSON input")).unwrap();
        enc.encode(&UiFrame::FinishStep).unwrap();
    }

    #[test]
    fn test_duplicate_tool_call_id_rejected() {
        let mut enc = started();
        enc.encode(&UiFrame::tool_input_start("call_1", "t")).unwrap();
        assert!(enc.encode(&UiFrame::tool_input_start("call_1", "t")).is_err());
    }

    #[test]
    fn test_nothing_after_finish() {
        let mut enc = FrameEncoder::new();
        enc.encode(&UiFrame::Start).unwrap();
        assert!(enc.done().is_err());
        enc.encode(&UiFrame::Finish).unwrap();
        assert!(enc.encode(&UiFrame::StartStep).is_err());
        assert!(enc.encode(&UiFrame::Finish).is_err());
        enc.done().unwrap();
        assert!(enc.done().is_err());
    }

    #[test]
    fn test_rejected_frame_leaves_state() {
        let mut enc = started();
        enc.encode(&UiFrame::tool_input_start("call_1", "t")).unwrap();
        let before = enc.frame_count();
        assert!(
            enc.encode(&UiFrame::tool_input_available("call_1", "other", json!({})))
                .is_err()
        );
        assert_eq!(enc.frame_count(), before);
        assert_eq!(enc.tool("call_1").unwrap().state(), ToolState::InputStreaming);
    }
}
