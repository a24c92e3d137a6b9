//! Chat request payload and its conversion into model messages.
//!
//! Clients send the whole conversation as UI messages: each has a role and
//! an ordered list of parts (`text`, `step-start`, or a `tool-*` part that
//! records an earlier tool call). Converting them keeps earlier retrieval
//! results in the model's context: a tool part that carries an output
//! becomes an assistant tool call followed by its tool result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kdesk_llm::{ContentBlock, Message};

const TOOL_PART_PREFIX: &str = "tool-";

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Client-side conversation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub messages: Vec<UiMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
}

impl ChatRequest {
    /// The messages to answer.
    ///
    /// Regenerating drops a trailing assistant message so the model answers
    /// the last user message afresh.
    pub fn conversation(&self) -> &[UiMessage] {
        let regenerate = self.trigger.is_some_and(|t| t.is_regenerate());
        match self.messages.split_last() {
            Some((last, rest)) if regenerate && last.role == UiRole::Assistant => rest,
            _ => &self.messages,
        }
    }
}

/// What the client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    SubmitUserMessage,
    RegenerateAssistantMessage,
    SubmitMessage,
    RegenerateMessage,
}

impl Trigger {
    pub fn is_regenerate(&self) -> bool {
        matches!(
            self,
            Trigger::RegenerateAssistantMessage | Trigger::RegenerateMessage
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    pub id: String,
    pub role: UiRole,
    pub parts: Vec<UiPart>,
}

impl UiMessage {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                UiPart::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextState {
    Done,
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolPartState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

/// A recorded tool call. `tool` is the part type without its `tool-` prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPart {
    pub tool: String,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
    pub state: Option<ToolPartState>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error_text: Option<String>,
}

impl ToolPart {
    /// The tool's name, from `toolName` or else the part type.
    pub fn name(&self) -> &str {
        self.tool_name.as_deref().unwrap_or(&self.tool)
    }
}

/// One part of a UI message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPart", into = "RawPart")]
pub enum UiPart {
    Text {
        text: String,
        state: Option<TextState>,
    },
    StepStart,
    Tool(ToolPart),
}

/// Wire shape of a part; the `type` tag of tool parts is open-ended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_text: Option<String>,
}

fn parse_state<T: serde::de::DeserializeOwned>(state: Option<String>) -> Result<Option<T>, String> {
    state
        .map(|s| serde_json::from_value(Value::String(s.clone())).map_err(|_| format!("invalid state '{s}'")))
        .transpose()
}

impl TryFrom<RawPart> for UiPart {
    type Error = String;

    fn try_from(raw: RawPart) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "text" => Ok(UiPart::Text {
                text: raw.text.ok_or("text part is missing 'text'")?,
                state: parse_state(raw.state)?,
            }),
            "step-start" => Ok(UiPart::StepStart),
            kind => match kind.strip_prefix(TOOL_PART_PREFIX) {
                Some(tool) => Ok(UiPart::Tool(ToolPart {
                    tool: tool.to_string(),
                    tool_call_id: raw.tool_call_id,
                    tool_name: raw.tool_name,
                    state: parse_state(raw.state)?,
                    input: raw.input,
                    output: raw.output,
                    error_text: raw.error_text,
                })),
                None => Err(format!("unsupported part type '{kind}'")),
            },
        }
    }
}

fn state_string<T: Serialize>(state: Option<T>) -> Option<String> {
    state
        .and_then(|s| serde_json::to_value(s).ok())
        .and_then(|v| v.as_str().map(String::from))
}

impl From<UiPart> for RawPart {
    fn from(part: UiPart) -> Self {
        match part {
            UiPart::Text { text, state } => RawPart {
                kind: "text".to_string(),
                text: Some(text),
                state: state_string(state),
                ..Default::default()
            },
            UiPart::StepStart => RawPart {
                kind: "step-start".to_string(),
                ..Default::default()
            },
            UiPart::Tool(tool) => RawPart {
                kind: format!("{TOOL_PART_PREFIX}{}", tool.tool),
                state: state_string(tool.state),
                tool_call_id: tool.tool_call_id,
                tool_name: tool.tool_name,
                input: tool.input,
                output: tool.output,
                error_text: tool.error_text,
                ..Default::default()
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// A conversation ready for the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelConversation {
    /// Client system instructions, in order. They follow the built-in prompt.
    pub system: Vec<String>,
    pub messages: Vec<Message>,
}

/// Convert UI messages into model messages.
///
/// Within an assistant message, each `step-start` begins a new model round:
/// the text and tool calls before it form one assistant message, followed by
/// a message carrying their tool results. Tool parts without an outcome are
/// dropped, since the model cannot be shown a call without its result.
pub fn to_model_messages(messages: &[UiMessage]) -> ModelConversation {
    let mut conversation = ModelConversation::default();

    for message in messages {
        match message.role {
            UiRole::System => {
                let text = message.text();
                if !text.trim().is_empty() {
                    conversation.system.push(text);
                }
            }
            UiRole::User => {
                let text = message.text();
                if !text.is_empty() {
                    conversation.messages.push(Message::user(text));
                }
            }
            UiRole::Assistant => convert_assistant(message, &mut conversation.messages),
        }
    }

    conversation
}

fn convert_assistant(message: &UiMessage, out: &mut Vec<Message>) {
    let mut blocks = Vec::new();
    let mut results = Vec::new();

    for (position, part) in message.parts.iter().enumerate() {
        match part {
            UiPart::Text { text, .. } => {
                if !text.is_empty() {
                    blocks.push(ContentBlock::text(text.clone()));
                }
            }
            UiPart::StepStart => flush_round(&mut blocks, &mut results, out),
            UiPart::Tool(tool) => {
                let Some(result) = tool_result(tool) else {
                    continue;
                };
                let id = tool
                    .tool_call_id
                    .clone()
                    .unwrap_or_else(|| format!("{}_{position}", message.id));
                let input = tool.input.clone().unwrap_or_else(|| Value::Object(Default::default()));
                blocks.push(ContentBlock::tool_use(&id, tool.name(), input));
                results.push(match result {
                    Ok(content) => ContentBlock::tool_result_success(id, content),
                    Err(error) => ContentBlock::tool_result_error(id, error),
                });
            }
        }
    }
    flush_round(&mut blocks, &mut results, out);
}

fn flush_round(blocks: &mut Vec<ContentBlock>, results: &mut Vec<ContentBlock>, out: &mut Vec<Message>) {
    if !blocks.is_empty() {
        out.push(Message::assistant_blocks(std::mem::take(blocks)));
    }
    if !results.is_empty() {
        out.push(Message::tool_results(std::mem::take(results)));
    }
}

/// The recorded outcome of a tool part, if it has one.
fn tool_result(tool: &ToolPart) -> Option<Result<String, String>> {
    if let Some(output) = &tool.output {
        return Some(Ok(match output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }));
    }
    if tool.state == Some(ToolPartState::OutputError) || tool.error_text.is_some() {
        return Some(Err(tool
            .error_text
            .clone()
            .unwrap_or_else(|| "Tool execution failed".to_string())));
    }
    None
}

#[cfg(test)]
mod tests {
    use kdesk_llm::Role;
    use serde_json::json;

    use super::*;

    fn request(value: Value) -> ChatRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_request_with_all_part_kinds() {
        let req = request(json!({
            "id": "chat-1",
            "trigger": "submit-message",
            "messages": [
                {"id": "m1", "role": "user", "parts": [{"type": "text", "text": "Halo"}]},
                {"id": "m2", "role": "assistant", "parts": [
                    {"type": "step-start"},
                    {"type": "tool-getInformationTool", "toolCallId": "call_1",
                     "state": "output-available", "input": {"prompt": "Halo"}, "output": {"hasRelevantInfo": false}},
                    {"type": "text", "text": "Hai!", "state": "done"}
                ]}
            ]
        }));

        assert_eq!(req.id.as_deref(), Some("chat-1"));
        assert_eq!(req.trigger, Some(Trigger::SubmitMessage));
        let parts = &req.messages[1].parts;
        assert_eq!(parts[0], UiPart::StepStart);
        let UiPart::Tool(tool) = &parts[1] else {
            panic!("expected tool part");
        };
        assert_eq!(tool.name(), "getInformationTool");
        assert_eq!(tool.state, Some(ToolPartState::OutputAvailable));
        assert_eq!(
            parts[2],
            UiPart::Text {
                text: "Hai!".into(),
                state: Some(TextState::Done)
            }
        );
    }

    #[test]
    fn test_part_serializes_back_to_wire_shape() {
        let part = UiPart::Tool(ToolPart {
            tool: "webSearch".into(),
            tool_call_id: Some("call_9".into()),
            tool_name: None,
            state: Some(ToolPartState::OutputError),
            input: None,
            output: None,
            error_text: Some("boom".into()),
        });
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"type": "tool-webSearch", "state": "output-error", "toolCallId": "call_9", "errorText": "boom"})
        );
        assert_eq!(
            serde_json::to_value(UiPart::StepStart).unwrap(),
            json!({"type": "step-start"})
        );
    }

    #[test]
    fn test_rejects_unknown_parts_and_roles() {
        let bad_part = json!({"messages": [{"id": "m", "role": "user", "parts": [{"type": "image"}]}]});
        assert!(serde_json::from_value::<ChatRequest>(bad_part).is_err());

        let bad_role = json!({"messages": [{"id": "m", "role": "tool", "parts": []}]});
        assert!(serde_json::from_value::<ChatRequest>(bad_role).is_err());

        let bad_state = json!({"messages": [{"id": "m", "role": "user", "parts": [{"type": "text", "text": "x", "state": "half"}]}]});
        assert!(serde_json::from_value::<ChatRequest>(bad_state).is_err());
    }

    #[test]
    fn test_regenerate_drops_trailing_assistant() {
        let mut req = request(json!({
            "trigger": "regenerate-message",
            "messages": [
                {"id": "m1", "role": "user", "parts": [{"type": "text", "text": "Q"}]},
                {"id": "m2", "role": "assistant", "parts": [{"type": "text", "text": "A"}]}
            ]
        }));
        assert_eq!(req.conversation().len(), 1);

        req.trigger = Some(Trigger::SubmitUserMessage);
        assert_eq!(req.conversation().len(), 2);

        req.trigger = None;
        assert_eq!(req.conversation().len(), 2);
    }

    #[test]
    fn test_conversion_collects_system_and_user_text() {
        let req = request(json!({"messages": [
            {"id": "s", "role": "system", "parts": [{"type": "text", "text": "Answer in English."}]},
            {"id": "u", "role": "user", "parts": [
                {"type": "text", "text": "Berapa biaya "},
                {"type": "text", "text": "legalisir?"}
            ]}
        ]}));
        let conv = to_model_messages(req.conversation());
        assert_eq!(conv.system, vec!["Answer in English."]);
        assert_eq!(conv.messages, vec![Message::user("Berapa biaya legalisir?")]);
    }

    #[test]
    fn test_conversion_splits_assistant_rounds() {
        let req = request(json!({"messages": [
            {"id": "u", "role": "user", "parts": [{"type": "text", "text": "Q"}]},
            {"id": "a", "role": "assistant", "parts": [
                {"type": "step-start"},
                {"type": "tool-getInformationTool", "toolCallId": "call_1",
                 "input": {"prompt": "Q"}, "output": {"hasRelevantInfo": true}},
                {"type": "tool-getInformationTool", "toolCallId": "call_2",
                 "state": "input-available", "input": {"prompt": "Q"}},
                {"type": "step-start"},
                {"type": "text", "text": "Jawaban."}
            ]}
        ]}));

        let conv = to_model_messages(req.conversation());
        assert_eq!(conv.messages.len(), 4);

        let call = &conv.messages[1];
        assert_eq!(call.role, Role::Assistant);
        assert_eq!(
            call.content,
            vec![ContentBlock::tool_use("call_1", "getInformationTool", json!({"prompt": "Q"}))]
        );
        assert_eq!(
            conv.messages[2].content,
            vec![ContentBlock::tool_result_success("call_1", r#"{"hasRelevantInfo":true}"#)]
        );
        assert_eq!(conv.messages[3], Message::assistant("Jawaban."));
    }

    #[test]
    fn test_conversion_keeps_tool_errors() {
        let req = request(json!({"messages": [
            {"id": "a", "role": "assistant", "parts": [
                {"type": "tool-getInformationTool", "state": "output-error", "errorText": "store down"}
            ]}
        ]}));
        let conv = to_model_messages(req.conversation());
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(
            conv.messages[1].content,
            vec![ContentBlock::tool_result_error("a_0", "store down")]
        );
    }
}
