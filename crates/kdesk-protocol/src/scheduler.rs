//! Turn scheduling: upstream lifecycle events in, SSE lines out.
//!
//! A [`TurnScheduler`] owns the outbound connection for exactly one turn.
//! It assigns text part ids, sub-chunks deltas through a [`ChunkPolicy`],
//! validates every frame with a [`FrameEncoder`], and on every exit path
//! (normal finish, upstream failure, cancellation, consumer disconnect)
//! closes what is open and terminates the stream with `finish` and
//! `[DONE]`.
//!
//! [`ChunkPolicy`]: crate::chunking::ChunkPolicy

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chunking::{DeltaKind, SharedChunkPolicy, WholeChunks};
use crate::encoder::FrameEncoder;
use crate::error::ProtocolError;
use crate::frames::UiFrame;
use crate::invocation::{CANCELLED_ERROR_TEXT, ToolState};

/// The outbound connection: encoded SSE lines, in order.
pub type FrameSink = mpsc::Sender<Bytes>;

/// Error text for tool calls still open when a turn completes normally.
const UNFINISHED_TOOL_TEXT: &str = "Tool execution did not complete";

/// Lifecycle events produced by the session, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    StepStart,
    /// Assistant text. Opens a new text part if none is open.
    TextDelta(String),
    /// Close the current text part, if any.
    TextEnd,
    ToolInputStart {
        call_id: String,
        tool_name: String,
    },
    ToolInputDelta {
        call_id: String,
        delta: String,
    },
    ToolInputAvailable {
        call_id: String,
        tool_name: String,
        input: Value,
    },
    /// The tool started running. Emits nothing.
    ToolExecuting {
        call_id: String,
    },
    ToolOutput {
        call_id: String,
        output: Value,
    },
    ToolError {
        call_id: String,
        error_text: String,
    },
    StepFinish,
    /// The turn ended normally.
    Finish,
    /// The turn cannot continue; open parts are closed with this message.
    Fail(String),
}

/// Terminal status of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Completed,
    Aborted,
    Errored,
}

/// What happened to a turn once its stream is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub steps: u32,
    /// Frames accepted by the encoder, excluding the sentinel.
    pub frames: usize,
    pub error: Option<String>,
}

enum Ending {
    Completed,
    Cancelled,
    Disconnected,
    Failed(String),
    Broken(ProtocolError),
}

impl From<ProtocolError> for Ending {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::SinkClosed => Ending::Disconnected,
            other => Ending::Broken(other),
        }
    }
}

/// Drives one turn's frames onto a [`FrameSink`].
pub struct TurnScheduler {
    encoder: FrameEncoder,
    policy: SharedChunkPolicy,
    sink: FrameSink,
    cancel: CancellationToken,
    text_parts: u32,
    current_text: Option<String>,
}

impl TurnScheduler {
    pub fn new(sink: FrameSink, cancel: CancellationToken) -> Self {
        Self {
            encoder: FrameEncoder::new(),
            policy: Arc::new(WholeChunks),
            sink,
            cancel,
            text_parts: 0,
            current_text: None,
        }
    }

    pub fn with_policy(mut self, policy: SharedChunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Consume `events` until the turn ends, then close the stream.
    ///
    /// The sink is dropped when this returns, which ends the response body.
    pub async fn run<S>(mut self, events: S) -> TurnOutcome
    where
        S: Stream<Item = TurnEvent> + Send,
    {
        let events = std::pin::pin!(events);
        let ending = self.drive(events).await;
        self.close(ending).await
    }

    async fn drive<S>(&mut self, mut events: Pin<&mut S>) -> Ending
    where
        S: Stream<Item = TurnEvent>,
    {
        if let Err(ending) = self.emit(UiFrame::Start).await {
            return ending;
        }
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ending::Cancelled,
                next = events.next() => next,
            };
            let result = match next {
                None => return Ending::Failed("response stream ended unexpectedly".to_string()),
                Some(TurnEvent::Finish) => return Ending::Completed,
                Some(TurnEvent::Fail(message)) => return Ending::Failed(message),
                Some(event) => self.handle(event).await,
            };
            if let Err(ending) = result {
                return ending;
            }
        }
    }

    async fn handle(&mut self, event: TurnEvent) -> Result<(), Ending> {
        match event {
            TurnEvent::StepStart => {
                self.end_text().await?;
                self.emit(UiFrame::StartStep).await
            }
            TurnEvent::TextDelta(text) => self.text(&text).await,
            TurnEvent::TextEnd => self.end_text().await,
            TurnEvent::ToolInputStart { call_id, tool_name } => {
                self.end_text().await?;
                self.emit(UiFrame::tool_input_start(call_id, tool_name)).await
            }
            TurnEvent::ToolInputDelta { call_id, delta } => {
                for chunk in self.policy.split(DeltaKind::ToolInput, &delta) {
                    self.emit(UiFrame::tool_input_delta(&call_id, chunk)).await?;
                }
                Ok(())
            }
            TurnEvent::ToolInputAvailable {
                call_id,
                tool_name,
                input,
            } => {
                self.emit(UiFrame::tool_input_available(call_id, tool_name, input))
                    .await
            }
            TurnEvent::ToolExecuting { call_id } => {
                self.encoder.mark_executing(&call_id)?;
                Ok(())
            }
            TurnEvent::ToolOutput { call_id, output } => {
                self.emit(UiFrame::tool_output_available(call_id, output))
                    .await
            }
            TurnEvent::ToolError {
                call_id,
                error_text,
            } => {
                self.emit(UiFrame::tool_output_error(call_id, error_text))
                    .await
            }
            TurnEvent::StepFinish => {
                self.end_text().await?;
                self.emit(UiFrame::FinishStep).await
            }
            TurnEvent::Finish | TurnEvent::Fail(_) => Ok(()),
        }
    }

    async fn text(&mut self, text: &str) -> Result<(), Ending> {
        if text.is_empty() {
            return Ok(());
        }
        let id = match &self.current_text {
            Some(id) => id.clone(),
            None => {
                self.text_parts += 1;
                let id = format!("text-{}", self.text_parts);
                self.emit(UiFrame::text_start(&id)).await?;
                self.current_text = Some(id.clone());
                id
            }
        };
        for chunk in self.policy.split(DeltaKind::Text, text) {
            self.emit(UiFrame::text_delta(&id, chunk)).await?;
        }
        Ok(())
    }

    async fn end_text(&mut self) -> Result<(), Ending> {
        match self.current_text.take() {
            Some(id) => self.emit(UiFrame::text_end(id)).await,
            None => Ok(()),
        }
    }

    /// Pace, validate and send one frame. Cancellation is observed while
    /// pacing and while waiting for buffer space, both before the frame is
    /// encoded, so the encoder never records a frame the consumer did not
    /// receive.
    async fn emit(&mut self, frame: UiFrame) -> Result<(), Ending> {
        if let Some(pause) = self.policy.pause() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Ending::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        }
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Ending::Cancelled),
            permit = self.sink.reserve() => permit.map_err(|_| Ending::Disconnected)?,
        };
        let line = self.encoder.encode(&frame)?;
        permit.send(line);
        Ok(())
    }

    async fn close(mut self, ending: Ending) -> TurnOutcome {
        let (status, tool_error, error) = match ending {
            Ending::Completed => (TurnStatus::Completed, UNFINISHED_TOOL_TEXT.to_string(), None),
            Ending::Cancelled => (TurnStatus::Aborted, CANCELLED_ERROR_TEXT.to_string(), None),
            Ending::Disconnected => {
                tracing::debug!("stream consumer disconnected");
                (TurnStatus::Aborted, CANCELLED_ERROR_TEXT.to_string(), None)
            }
            Ending::Failed(message) => {
                tracing::warn!(error = %message, "turn failed mid-stream");
                (TurnStatus::Errored, message.clone(), Some(message))
            }
            Ending::Broken(err) => {
                tracing::error!(error = %err, "turn aborted on framing error");
                let message = err.to_string();
                (TurnStatus::Errored, message.clone(), Some(message))
            }
        };

        if status != TurnStatus::Completed {
            self.cancel.cancel();
        }

        if !self.encoder.is_started() {
            self.emit_final(UiFrame::Start).await;
        }
        let open_tools = self.encoder.open_tool_calls();
        if status == TurnStatus::Completed && !open_tools.is_empty() {
            tracing::warn!(?open_tools, "turn completed with unfinished tool calls");
        }
        for call_id in open_tools {
            // Input never arrived, so the call can only end as cancelled.
            let streaming = self
                .encoder
                .tool(&call_id)
                .is_some_and(|t| t.state() == ToolState::InputStreaming);
            let text = if streaming {
                CANCELLED_ERROR_TEXT.to_string()
            } else {
                tool_error.clone()
            };
            self.emit_final(UiFrame::tool_output_error(call_id, text)).await;
        }
        for id in self.encoder.open_text_ids() {
            self.emit_final(UiFrame::text_end(id)).await;
        }
        if self.encoder.step_open() {
            self.emit_final(UiFrame::FinishStep).await;
        }
        self.emit_final(UiFrame::Finish).await;
        match self.encoder.done() {
            Ok(line) => {
                let _ = self.sink.send(line).await;
            }
            Err(err) => tracing::error!(error = %err, "could not terminate stream"),
        }

        let outcome = TurnOutcome {
            status,
            steps: self.encoder.steps(),
            frames: self.encoder.frame_count(),
            error,
        };
        tracing::debug!(
            status = ?outcome.status,
            steps = outcome.steps,
            frames = outcome.frames,
            "turn closed"
        );
        outcome
    }

    /// Closing frames ignore cancellation and a departed consumer.
    async fn emit_final(&mut self, frame: UiFrame) {
        match self.encoder.encode(&frame) {
            Ok(line) => {
                let _ = self.sink.send(line).await;
            }
            Err(err) => tracing::error!(error = %err, frame = frame.kind(), "closing frame rejected"),
        }
    }
}

/// Adapt a channel receiver into an event stream for [`TurnScheduler::run`].
pub fn receiver_stream<T: Send + 'static>(rx: mpsc::Receiver<T>) -> impl Stream<Item = T> + Send {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}
