//! The per-request conversation loop.
//!
//! A [`ConversationStreamSession`] runs one turn at a time: it calls the
//! model, relays its text and tool-call fragments as [`TurnEvent`]s, runs the
//! requested tools inside the same step, feeds their results back to the
//! model, and repeats until the model stops calling tools or the step budget
//! is spent.
//!
//! The events go to a [`TurnScheduler`](kdesk_protocol::TurnScheduler) over
//! a channel. The session never writes frames itself; if the scheduler goes
//! away, the next send fails and the turn stops.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use kdesk_llm::{
    CompletionRequest, ContentBlock, Message, ResponseStream, SharedBackend, StreamEvent,
    ToolDefinition,
};
use kdesk_protocol::{ProtocolError, ToolInvocation, TurnEvent, TurnStatus};

use crate::prompt::SystemPromptBuilder;
use crate::tool::{ToolContext, ToolRegistry};
use crate::types::{Session, SessionId, Step, Turn, TurnId};
use crate::ui::ModelConversation;

/// Channel the session feeds the scheduler through.
pub type TurnEventSender = mpsc::Sender<TurnEvent>;

/// Per-session model settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    /// Model rounds allowed per turn.
    pub max_steps: u32,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl SessionSettings {
    pub const DEFAULT_MAX_STEPS: u32 = 5;
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;

    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_steps: Self::DEFAULT_MAX_STEPS,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Set the step budget. At least one step always runs.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Why a turn stopped early.
#[derive(Debug)]
enum Stop {
    Cancelled,
    Disconnected,
    Failed(String),
}

impl From<ProtocolError> for Stop {
    fn from(err: ProtocolError) -> Self {
        Stop::Failed(err.to_string())
    }
}

/// Everything a step needs that belongs to the running turn.
struct TurnContext {
    events: TurnEventSender,
    cancel: CancellationToken,
    turn_id: TurnId,
    system: String,
    tools: Vec<ToolDefinition>,
}

impl TurnContext {
    async fn emit(&self, event: TurnEvent) -> Result<(), Stop> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Stop::Cancelled),
            sent = self.events.send(event) => sent.map_err(|_| Stop::Disconnected),
        }
    }
}

/// Coordinates model calls, tool execution and event emission for one
/// conversation.
pub struct ConversationStreamSession {
    session: Session,
    backend: SharedBackend,
    tools: Arc<ToolRegistry>,
    settings: SessionSettings,
    prompt: SystemPromptBuilder,
}

impl ConversationStreamSession {
    pub fn new(backend: SharedBackend, tools: Arc<ToolRegistry>, settings: SessionSettings) -> Self {
        Self {
            session: Session::new(),
            backend,
            tools,
            settings,
            prompt: SystemPromptBuilder::new(),
        }
    }

    pub fn with_session_id(mut self, id: impl Into<SessionId>) -> Self {
        self.session = Session::with_id(id.into());
        self
    }

    /// Replace the built-in system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = SystemPromptBuilder::with_base(prompt);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Run one turn, sending its events to `events`.
    ///
    /// Ends by sending [`TurnEvent::Finish`] when the turn completes or
    /// [`TurnEvent::Fail`] when the model or the framing fails. Nothing is
    /// sent after cancellation; the scheduler closes the stream itself. The
    /// returned turn is also recorded in the session.
    pub async fn run_turn(
        &mut self,
        conversation: ModelConversation,
        events: TurnEventSender,
        cancel: CancellationToken,
    ) -> Turn {
        let mut turn = Turn::new();
        let ctx = TurnContext {
            events,
            cancel,
            turn_id: turn.id,
            system: self.prompt.clone().with_sections(conversation.system).build(),
            tools: self.tools.to_llm_definitions(),
        };

        tracing::debug!(
            session_id = %self.session.id,
            turn_id = %turn.id,
            messages = conversation.messages.len(),
            tools = ctx.tools.len(),
            "turn started"
        );

        let mut result = self.drive(&mut turn, conversation.messages, &ctx).await;
        if result.is_ok() {
            result = ctx.emit(TurnEvent::Finish).await;
        }

        match result {
            Ok(()) => turn.close(TurnStatus::Completed, None),
            Err(Stop::Cancelled) => turn.close(TurnStatus::Aborted, None),
            Err(Stop::Disconnected) => {
                tracing::debug!(session_id = %self.session.id, "event consumer went away");
                ctx.cancel.cancel();
                turn.close(TurnStatus::Aborted, None);
            }
            Err(Stop::Failed(message)) => {
                tracing::warn!(session_id = %self.session.id, error = %message, "turn failed");
                // The scheduler may already be gone; there is nobody left to tell.
                let _ = ctx.events.send(TurnEvent::Fail(message.clone())).await;
                turn.close(TurnStatus::Errored, Some(message));
            }
        }

        let usage = turn.usage();
        tracing::info!(
            session_id = %self.session.id,
            turn_id = %turn.id,
            status = ?turn.status,
            steps = turn.steps.len(),
            tool_calls = turn.tool_call_count(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "turn finished"
        );

        self.session.push_turn(turn.clone());
        turn
    }

    async fn drive(
        &self,
        turn: &mut Turn,
        mut messages: Vec<Message>,
        ctx: &TurnContext,
    ) -> Result<(), Stop> {
        for index in 1..=self.settings.max_steps {
            let mut request =
                CompletionRequest::new(&self.settings.model, messages.clone(), self.settings.max_tokens)
                    .with_system(ctx.system.clone())
                    .with_tools(ctx.tools.clone());
            if let Some(t) = self.settings.temperature {
                request = request.with_temperature(t);
            }

            let stream = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(Stop::Cancelled),
                started = self.backend.complete_stream(request) => {
                    started.map_err(|e| Stop::Failed(e.to_string()))?
                }
            };

            ctx.emit(TurnEvent::StepStart).await?;
            let mut step = Step::new(index);
            let result = self.run_step(&mut step, stream, ctx).await;
            let wants_tools = step.has_tool_calls();
            turn.steps.push(step);
            messages.extend(result?);

            if !wants_tools {
                return Ok(());
            }
            if index == self.settings.max_steps {
                tracing::debug!(
                    session_id = %self.session.id,
                    max_steps = self.settings.max_steps,
                    "step budget reached, finishing turn"
                );
            }
        }
        Ok(())
    }

    /// Relay one model round, run its tool calls and close the step.
    ///
    /// Returns the messages that carry this round back to the model.
    async fn run_step(
        &self,
        step: &mut Step,
        mut stream: ResponseStream,
        ctx: &TurnContext,
    ) -> Result<Vec<Message>, Stop> {
        // Provider call index -> position in `step.tool_calls`.
        let mut calls: HashMap<usize, usize> = HashMap::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(Stop::Cancelled),
                next = stream.next() => next,
            };
            let Some(event) = next else { break };
            match event.map_err(|e| Stop::Failed(e.to_string()))? {
                StreamEvent::MessageStart { model, .. } => {
                    tracing::trace!(step = step.index, %model, "model round started");
                }
                StreamEvent::TextDelta(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    step.text.push_str(&text);
                    ctx.emit(TurnEvent::TextDelta(text)).await?;
                }
                StreamEvent::ToolUseStart { index, id, name } => {
                    if calls.contains_key(&index) {
                        tracing::warn!(index, tool_call_id = %id, "duplicate tool call start ignored");
                        continue;
                    }
                    calls.insert(index, step.tool_calls.len());
                    step.tool_calls.push(ToolInvocation::new(&id, &name));
                    ctx.emit(TurnEvent::ToolInputStart {
                        call_id: id,
                        tool_name: name,
                    })
                    .await?;
                }
                StreamEvent::ToolInputDelta { index, partial_json } => {
                    let Some(call) = calls.get(&index).and_then(|&i| step.tool_calls.get_mut(i))
                    else {
                        tracing::warn!(index, "input fragment for unknown tool call ignored");
                        continue;
                    };
                    call.push_input_delta(&partial_json)?;
                    let call_id = call.call_id().to_string();
                    ctx.emit(TurnEvent::ToolInputDelta {
                        call_id,
                        delta: partial_json,
                    })
                    .await?;
                }
                StreamEvent::MessageDelta { stop_reason, usage } => {
                    step.stop_reason = Some(stop_reason);
                    step.usage += usage;
                }
                StreamEvent::MessageStop => break,
            }
        }

        let mut blocks = Vec::new();
        if !step.text.is_empty() {
            blocks.push(ContentBlock::text(step.text.clone()));
        }
        let mut results = Vec::with_capacity(step.tool_calls.len());
        for call in &mut step.tool_calls {
            let (input, result) = self.run_tool(call, ctx).await?;
            blocks.push(ContentBlock::tool_use(call.call_id(), call.tool_name(), input));
            results.push(result);
        }

        ctx.emit(TurnEvent::StepFinish).await?;
        let tool_names: Vec<&str> = step.tool_calls.iter().map(|c| c.tool_name()).collect();
        tracing::debug!(
            step = step.index,
            stop_reason = ?step.stop_reason,
            input_tokens = step.usage.input_tokens,
            output_tokens = step.usage.output_tokens,
            tool_calls = ?tool_names,
            "step finished"
        );

        let mut messages = Vec::with_capacity(2);
        if !blocks.is_empty() {
            messages.push(Message::assistant_blocks(blocks));
        }
        if !results.is_empty() {
            messages.push(Message::tool_results(results));
        }
        Ok(messages)
    }

    /// Take one call from streamed input to a terminal state.
    ///
    /// Returns the input to record in the model history and the tool result
    /// block to send back.
    async fn run_tool(
        &self,
        call: &mut ToolInvocation,
        ctx: &TurnContext,
    ) -> Result<(Value, ContentBlock), Stop> {
        let call_id = call.call_id().to_string();

        let parsed = call.complete_input().map(Value::clone);
        let input = match parsed {
            Ok(input) => input,
            Err(_) => {
                let error_text = format!("Invalid JSON input for tool '{}'", call.tool_name());
                tracing::warn!(tool_call_id = %call_id, raw = call.raw_input(), "unparseable tool input");
                let raw = call.complete_input_as_text()?.clone();
                ctx.emit(TurnEvent::ToolInputAvailable {
                    call_id: call_id.clone(),
                    tool_name: call.tool_name().to_string(),
                    input: raw,
                })
                .await?;
                call.fail(&error_text)?;
                ctx.emit(TurnEvent::ToolError {
                    call_id: call_id.clone(),
                    error_text: error_text.clone(),
                })
                .await?;
                let block = ContentBlock::tool_result_error(call_id, error_text);
                return Ok((Value::Object(Default::default()), block));
            }
        };

        ctx.emit(TurnEvent::ToolInputAvailable {
            call_id: call_id.clone(),
            tool_name: call.tool_name().to_string(),
            input: input.clone(),
        })
        .await?;

        call.start_executing()?;
        ctx.emit(TurnEvent::ToolExecuting {
            call_id: call_id.clone(),
        })
        .await?;

        let tool_ctx = ToolContext::with_cancellation(
            self.session.id.clone(),
            ctx.turn_id,
            ctx.cancel.child_token(),
        )
        .for_call(&call_id);

        let executed = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(Stop::Cancelled),
            executed = self.tools.execute(call.tool_name(), input.clone(), &tool_ctx) => executed,
        };

        let (outcome, llm_content) = match executed {
            Ok(result) => {
                let content = result.to_llm_content();
                (result.into_output(), content)
            }
            Err(e) => {
                let text = e.to_string();
                let content = format!("Error: {}", text);
                (Err(text), content)
            }
        };

        let block = match outcome {
            Ok(output) => {
                call.complete(output.clone())?;
                ctx.emit(TurnEvent::ToolOutput {
                    call_id: call_id.clone(),
                    output,
                })
                .await?;
                ContentBlock::tool_result_success(call_id, llm_content)
            }
            Err(error_text) => {
                tracing::debug!(tool_call_id = %call_id, error = %error_text, "tool call failed");
                call.fail(&error_text)?;
                ctx.emit(TurnEvent::ToolError {
                    call_id: call_id.clone(),
                    error_text,
                })
                .await?;
                ContentBlock::tool_result_error(call_id, llm_content)
            }
        };
        Ok((input, block))
    }
}
