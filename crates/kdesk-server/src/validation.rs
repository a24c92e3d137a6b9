//! Structural validation of request bodies.
//!
//! Bodies are checked as JSON values before they are deserialized, so that
//! every problem is reported at once with the path to the offending value.

use serde::Serialize;
use serde_json::{Map, Value};

use kdesk_agent::ChatRequest;
use kdesk_config::CredentialIssue;

use crate::error::{Result, ServerError};

const ROLES: &[&str] = &["system", "user", "assistant"];
const TEXT_STATES: &[&str] = &["done", "streaming"];
const TOOL_STATES: &[&str] = &[
    "input-streaming",
    "input-available",
    "output-available",
    "output-error",
];
const TRIGGERS: &[&str] = &[
    "submit-user-message",
    "regenerate-assistant-message",
    "submit-message",
    "regenerate-message",
];

/// One step of a path into a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl ValidationIssue {
    pub fn root(message: impl Into<String>) -> Self {
        Self {
            code: "custom",
            path: Vec::new(),
            message: message.into(),
        }
    }
}

impl From<CredentialIssue> for ValidationIssue {
    fn from(issue: CredentialIssue) -> Self {
        Self {
            code: "invalid_value",
            path: vec![PathSegment::from(issue.field)],
            message: issue.message,
        }
    }
}

fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

/// Collects issues while walking a document.
#[derive(Default)]
struct Validator {
    path: Vec<PathSegment>,
    issues: Vec<ValidationIssue>,
}

impl Validator {
    fn push(&mut self, code: &'static str, key: Option<PathSegment>, message: String) {
        let mut path = self.path.clone();
        path.extend(key);
        self.issues.push(ValidationIssue {
            code,
            path,
            message,
        });
    }

    fn invalid_type(&mut self, key: Option<PathSegment>, expected: &str, got: Option<&Value>) {
        self.push(
            "invalid_type",
            key,
            format!("Invalid input: expected {expected}, received {}", type_name(got)),
        );
    }

    fn nested(&mut self, segment: impl Into<PathSegment>, check: impl FnOnce(&mut Self)) {
        self.path.push(segment.into());
        check(self);
        self.path.pop();
    }

    fn object<'a>(&mut self, value: &'a Value) -> Option<&'a Map<String, Value>> {
        let object = value.as_object();
        if object.is_none() {
            self.invalid_type(None, "object", Some(value));
        }
        object
    }

    fn string(&mut self, obj: &Map<String, Value>, key: &str, required: bool) {
        match obj.get(key) {
            Some(Value::String(_)) => {}
            None if !required => {}
            other => self.invalid_type(Some(key.into()), "string", other),
        }
    }

    fn one_of(&mut self, obj: &Map<String, Value>, key: &str, options: &[&str], required: bool) {
        match obj.get(key) {
            Some(Value::String(s)) if options.contains(&s.as_str()) => {}
            None if !required => {}
            _ => {
                let expected = options
                    .iter()
                    .map(|o| format!("\"{o}\""))
                    .collect::<Vec<_>>()
                    .join("|");
                self.push(
                    "invalid_value",
                    Some(key.into()),
                    format!("Invalid option: expected one of {expected}"),
                );
            }
        }
    }

    fn chat_request(&mut self, value: &Value) {
        let Some(obj) = self.object(value) else { return };
        self.string(obj, "id", false);
        match obj.get("messages") {
            Some(Value::Array(messages)) => {
                for (i, message) in messages.iter().enumerate() {
                    self.nested(PathSegment::from("messages"), |v| {
                        v.nested(i, |v| v.message(message));
                    });
                }
            }
            other => self.invalid_type(Some("messages".into()), "array", other),
        }
        self.one_of(obj, "trigger", TRIGGERS, false);
    }

    fn message(&mut self, value: &Value) {
        let Some(obj) = self.object(value) else { return };
        self.string(obj, "id", true);
        self.one_of(obj, "role", ROLES, true);
        match obj.get("parts") {
            Some(Value::Array(parts)) => {
                for (i, part) in parts.iter().enumerate() {
                    self.nested(PathSegment::from("parts"), |v| v.nested(i, |v| v.part(part)));
                }
            }
            other => self.invalid_type(Some("parts".into()), "array", other),
        }
    }

    fn part(&mut self, value: &Value) {
        let Some(obj) = self.object(value) else { return };
        match obj.get("type").and_then(Value::as_str) {
            Some("text") => {
                self.string(obj, "text", true);
                self.one_of(obj, "state", TEXT_STATES, false);
            }
            Some("step-start") => {}
            Some(kind) if kind.starts_with("tool-") => {
                self.string(obj, "toolCallId", false);
                self.string(obj, "toolName", false);
                self.one_of(obj, "state", TOOL_STATES, false);
                self.string(obj, "errorText", false);
            }
            _ => self.push(
                "invalid_union",
                Some("type".into()),
                "Invalid input: expected \"text\", \"step-start\" or a \"tool-\" part".to_string(),
            ),
        }
    }
}

/// Validate and decode a chat request body.
pub fn parse_chat_request(body: &[u8]) -> Result<ChatRequest> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ServerError::invalid_body(format!("Invalid JSON: {}", e)))?;

    let mut validator = Validator::default();
    validator.chat_request(&value);
    if !validator.issues.is_empty() {
        return Err(ServerError::Validation(validator.issues));
    }

    serde_json::from_value(value).map_err(|e| ServerError::invalid_body(e.to_string()))
}
