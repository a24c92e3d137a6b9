//! Streaming chat endpoints.
//!
//! `POST /api/chat` answers with a UI message stream. Credential and body
//! problems are rejected before any frame is written, and so is a model
//! provider that fails on the first call. Once the stream has started, every
//! failure ends it with a well-formed closing sequence instead.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use kdesk_agent::{ConversationStreamSession, demo_turn_events, to_model_messages};
use kdesk_protocol::{
    RandomChunks, STREAM_HEADERS, SharedChunkPolicy, TurnEvent, TurnScheduler, receiver_stream,
};

use crate::cookies;
use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::validation::parse_chat_request;

/// Events buffered between the session and the scheduler.
const EVENT_BUFFER: usize = 64;

/// Encoded frames buffered between the scheduler and the response body.
const FRAME_BUFFER: usize = 32;

/// POST /api/chat - Run one assistant turn and stream it.
pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let credentials = cookies::credentials(&headers)?;
    let request = parse_chat_request(&body)?;

    let conversation = to_model_messages(request.conversation());
    tracing::debug!(
        chat_id = request.id.as_deref().unwrap_or("-"),
        trigger = ?request.trigger,
        ui_messages = request.messages.len(),
        model_messages = conversation.messages.len(),
        system_sections = conversation.system.len(),
        model = %credentials.model,
        "chat request"
    );

    let backend = state.backends.backend(&credentials)?;
    let mut session = ConversationStreamSession::new(
        backend,
        Arc::new(state.tools()),
        state.session_settings(&credentials.model),
    );
    if let Some(id) = request.id.clone() {
        session = session.with_session_id(id);
    }

    let cancel = CancellationToken::new();
    let (event_tx, mut event_rx) = mpsc::channel(EVENT_BUFFER);
    let session_cancel = cancel.clone();
    tokio::spawn(async move {
        session.run_turn(conversation, event_tx, session_cancel).await;
    });

    // A provider that rejects the first call fails the request outright.
    let first = match event_rx.recv().await {
        Some(TurnEvent::Fail(message)) => {
            cancel.cancel();
            return Err(ServerError::Upstream(message));
        }
        Some(event) => event,
        None => {
            return Err(ServerError::Internal(
                "turn ended before producing any output".to_string(),
            ));
        }
    };

    let events = futures::stream::once(async move { first }).chain(receiver_stream(event_rx));
    stream_response(events, cancel, None)
}

/// POST /api/chat/mock - Replay the scripted demo turn.
///
/// Needs no credentials and ignores the request body. Frames are split into
/// random small chunks with short random pauses, as a live model would send
/// them.
pub async fn mock_chat_handler(State(state): State<AppState>) -> Result<Response> {
    let demo = &state.config.demo;
    let policy = RandomChunks::new(demo.min_chunk, demo.max_chunk)
        .with_tool_input_range(1, 5)
        .with_max_delay(Duration::from_millis(demo.max_delay_ms));
    tracing::debug!(?policy, "replaying demo turn");

    let events = futures::stream::iter(demo_turn_events());
    stream_response(events, CancellationToken::new(), Some(Arc::new(policy)))
}

/// Spawn a scheduler over `events` and return its frames as the response body.
///
/// Dropping the body closes the frame channel, which cancels the turn.
fn stream_response<S>(
    events: S,
    cancel: CancellationToken,
    policy: Option<SharedChunkPolicy>,
) -> Result<Response>
where
    S: Stream<Item = TurnEvent> + Send + 'static,
{
    let (sink, frames) = mpsc::channel::<Bytes>(FRAME_BUFFER);
    let mut scheduler = TurnScheduler::new(sink, cancel);
    if let Some(policy) = policy {
        scheduler = scheduler.with_policy(policy);
    }
    tokio::spawn(async move {
        let outcome = scheduler.run(events).await;
        tracing::info!(
            status = ?outcome.status,
            steps = outcome.steps,
            frames = outcome.frames,
            error = outcome.error.as_deref(),
            "stream closed"
        );
    });

    let body = Body::from_stream(receiver_stream(frames).map(Ok::<_, Infallible>));
    let mut response = Response::builder().status(StatusCode::OK);
    for (name, value) in STREAM_HEADERS {
        response = response.header(name, value);
    }
    response
        .body(body)
        .map_err(|e| ServerError::Internal(format!("failed to build stream response: {}", e)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Router, http::Request, routing::post};
    use kdesk_llm::{MockBackend, MockStep};
    use kdesk_protocol::{UiFrame, parse_frames};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::state::testing::state_with;

    const COOKIES: &str =
        "baseURL=https%3A%2F%2Fapi.openai.com%2Fv1; apiKey=sk-test; model=gpt-4o-mini";

    fn app(backend: Arc<MockBackend>) -> Router {
        Router::new()
            .route("/api/chat", post(chat_handler))
            .route("/api/chat/mock", post(mock_chat_handler))
            .with_state(state_with(backend))
    }

    fn chat_request(cookies: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json");
        if let Some(cookies) = cookies {
            builder = builder.header("cookie", cookies);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn user_says(text: &str) -> Value {
        json!({
            "id": "chat-1",
            "messages": [{"id": "m1", "role": "user", "parts": [{"type": "text", "text": text}]}],
            "trigger": "submit-message"
        })
    }

    async fn read(response: Response) -> (StatusCode, HeaderMap, String) {
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_chat_streams_retrieval_then_answer() {
        let backend = Arc::new(MockBackend::new(vec![
            MockStep::tool_call(
                "call_1",
                "getInformationTool",
                json!({"prompt": "legalisir ijazah"}),
            ),
            MockStep::text("Legalisir ijazah di KDEI gratis."),
        ]));
        let response = app(backend.clone())
            .oneshot(chat_request(Some(COOKIES), user_says("Legalisir ijazah?")))
            .await
            .unwrap();
        let (status, headers, body) = read(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "text/event-stream; charset=utf-8");
        assert_eq!(headers["x-vercel-ai-ui-message-stream"], "v1");
        assert_eq!(headers["x-accel-buffering"], "no");
        assert!(body.ends_with("data: [DONE]\n\n"));

        let frames = parse_frames(&body).unwrap();
        let output = frames
            .iter()
            .find_map(|f| match f {
                UiFrame::ToolOutputAvailable { output, .. } => Some(output.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(output["searchQuery"], "legalisir ijazah");
        assert_eq!(output["totalResults"], 2);
        assert_eq!(output["relevantResults"], 1);
        assert_eq!(output["hasRelevantInfo"], true);
        assert_eq!(frames.last(), Some(&UiFrame::Finish));

        let first = &backend.requests()[0];
        assert_eq!(first.model, "gpt-4o-mini");
        assert_eq!(first.tools[0].name, "getInformationTool");
    }

    #[tokio::test]
    async fn test_missing_cookies_rejected_before_model_call() {
        let backend = Arc::new(MockBackend::new(vec![MockStep::text("unused")]));
        let response = app(backend.clone())
            .oneshot(chat_request(Some("model=gpt-4o-mini"), user_says("Halo")))
            .await
            .unwrap();
        let (status, _, body) = read(response).await;
        let body: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid configuration");
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_body_is_422() {
        let backend = Arc::new(MockBackend::new(vec![]));
        let response = app(backend)
            .oneshot(chat_request(Some(COOKIES), json!({"messages": [{"id": "m1"}]})))
            .await
            .unwrap();
        let (status, _, body) = read(response).await;
        let body: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Unprocessable Entity.");
        assert_eq!(body["error"][0]["path"], json!(["messages", 0, "role"]));
    }

    #[tokio::test]
    async fn test_upstream_failure_before_stream_is_500() {
        let backend = Arc::new(MockBackend::new(vec![MockStep::Fail(
            "401 Unauthorized".into(),
        )]));
        let response = app(backend)
            .oneshot(chat_request(Some(COOKIES), user_says("Halo")))
            .await
            .unwrap();
        let (status, headers, body) = read(response).await;
        let body: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(headers["content-type"], "application/json");
        assert!(body["message"].as_str().unwrap().contains("401 Unauthorized"));
    }

    #[tokio::test]
    async fn test_regenerate_drops_trailing_answer() {
        let backend = Arc::new(MockBackend::new(vec![MockStep::text("Jawaban baru")]));
        let body = json!({
            "messages": [
                {"id": "m1", "role": "user", "parts": [{"type": "text", "text": "Halo"}]},
                {"id": "m2", "role": "assistant", "parts": [{"type": "text", "text": "Jawaban lama"}]}
            ],
            "trigger": "regenerate-message"
        });
        let response = app(backend.clone())
            .oneshot(chat_request(Some(COOKIES), body))
            .await
            .unwrap();
        let (status, _, _) = read(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(backend.requests()[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_stream_needs_no_credentials() {
        let backend = Arc::new(MockBackend::new(vec![]));
        let response = app(backend)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat/mock")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let (status, _, body) = read(response).await;

        assert_eq!(status, StatusCode::OK);
        let frames = parse_frames(&body).unwrap();
        assert_eq!(frames[0], UiFrame::Start);
        assert_eq!(
            frames[2],
            UiFrame::tool_input_start("call_oW7H7fWxCFljHvDbogowUp03", "getInformationTool")
        );
        assert_eq!(frames.last(), Some(&UiFrame::Finish));
        assert!(body.ends_with("data: [DONE]\n\n"));
    }
}
