//! The retrieval tool: searches the Q&A chat collection.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use kdesk_retrieval::{RetrievalOrchestrator, SearchStrategy};

use crate::error::Result;
use crate::tool::{ParamExt, ParameterValidationError, Tool, ToolContext, ToolResult};

pub const INFORMATION_TOOL_NAME: &str = "getInformationTool";

const DESCRIPTION: &str = "Retrieve similar chats/information from the database. Use different search strategies if previous attempts didn't find relevant information. Try: direct quotes, key terms, synonyms, technical terms, or simplified language.";

/// Validated parameters for the retrieval tool.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationParams {
    pub prompt: String,
    pub strategy: Option<SearchStrategy>,
    pub attempt: Option<u32>,
}

impl TryFrom<Value> for InformationParams {
    type Error = ParameterValidationError;

    fn try_from(params: Value) -> std::result::Result<Self, Self::Error> {
        let prompt = params.required_str("prompt", "provide the user's question or a search query")?;
        if prompt.trim().is_empty() {
            return Err(ParameterValidationError::invalid_value(
                "prompt",
                prompt,
                "prompt cannot be empty",
            ));
        }

        let strategy = params
            .optional_str("searchStrategy")?
            .map(|s| {
                s.parse::<SearchStrategy>()
                    .map_err(|message| ParameterValidationError::invalid_value("searchStrategy", s, message))
            })
            .transpose()?;

        let attempt = match params.optional_u64("attemptNumber")? {
            None => None,
            Some(0) => {
                return Err(ParameterValidationError::out_of_range(
                    "attemptNumber",
                    0,
                    "must be at least 1",
                ));
            }
            Some(n) => Some(u32::try_from(n).map_err(|_| {
                ParameterValidationError::out_of_range("attemptNumber", n, "must fit in 32 bits")
            })?),
        };

        Ok(Self {
            prompt: prompt.to_string(),
            strategy,
            attempt,
        })
    }
}

/// Tool wrapping one [`RetrievalOrchestrator`] attempt.
///
/// The output is the serialized search result; the model reads the
/// suggestions in it to decide whether to try another strategy.
pub struct InformationTool {
    orchestrator: Arc<RetrievalOrchestrator>,
}

impl InformationTool {
    pub fn new(orchestrator: Arc<RetrievalOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

impl std::fmt::Debug for InformationTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InformationTool")
            .field("settings", self.orchestrator.settings())
            .finish()
    }
}

#[async_trait]
impl Tool for InformationTool {
    fn name(&self) -> &str {
        INFORMATION_TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "A user prompt or search query"
                },
                "searchStrategy": {
                    "type": "string",
                    "enum": SearchStrategy::ALL.map(|s| s.as_str()),
                    "description": "Search strategy to use"
                },
                "attemptNumber": {
                    "type": "number",
                    "description": "Current attempt number (1-4)"
                }
            },
            "required": ["prompt"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let params = match InformationParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        tracing::debug!(
            tool_call_id = ctx.tool_call_id.as_deref().unwrap_or_default(),
            session_id = %ctx.session_id,
            "searching information database"
        );

        let result = self
            .orchestrator
            .search(&params.prompt, params.strategy, params.attempt)
            .await?;

        Ok(ToolResult::json(serde_json::to_value(result)?))
    }
}
