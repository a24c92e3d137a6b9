//! Server-sent events line format.
//!
//! Every frame is one `data: <json>` line followed by a blank line. The
//! stream ends with `data: [DONE]`.

use bytes::Bytes;

use crate::error::{ProtocolError, Result};
use crate::frames::UiFrame;

pub const CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Header announcing the UI message stream protocol version.
pub const PROTOCOL_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const PROTOCOL_VERSION: &str = "v1";

/// Headers sent with every stream response, content type included.
pub const STREAM_HEADERS: [(&str, &str); 5] = [
    ("content-type", CONTENT_TYPE),
    ("cache-control", "no-cache, no-transform"),
    ("connection", "keep-alive"),
    (PROTOCOL_HEADER, PROTOCOL_VERSION),
    ("x-accel-buffering", "no"),
];

pub const DONE_LINE: &[u8] = b"data: [DONE]\n\n";

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Encode one frame as a complete SSE event.
pub fn frame_line(frame: &UiFrame) -> Result<Bytes> {
    let json = serde_json::to_string(frame)?;
    let mut line = String::with_capacity(json.len() + 8);
    line.push_str("data: ");
    line.push_str(&json);
    line.push_str("\n\n");
    Ok(Bytes::from(line))
}

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseMessage {
    Frame(UiFrame),
    Done,
}

/// Decode a complete stream body.
///
/// Lines other than `data:` lines (comments, blank separators) are skipped.
pub fn parse_stream(body: &str) -> Result<Vec<SseMessage>> {
    body.lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(|data| {
            let data = data.trim_start();
            if data == DONE_MARKER {
                Ok(SseMessage::Done)
            } else {
                serde_json::from_str(data)
                    .map(SseMessage::Frame)
                    .map_err(|e| ProtocolError::Decode(format!("{e}: {data}")))
            }
        })
        .collect()
}

/// Decode a stream body, keeping only frames.
pub fn parse_frames(body: &str) -> Result<Vec<UiFrame>> {
    Ok(parse_stream(body)?
        .into_iter()
        .filter_map(|m| match m {
            SseMessage::Frame(f) => Some(f),
            SseMessage::Done => None,
        })
        .collect())
}
