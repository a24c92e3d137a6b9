//! The assistant-turn streaming protocol.
//!
//! A turn travels from the session to the browser as an AI SDK v6 UI message
//! stream:
//!
//! ```text
//! TurnEvent ──► TurnScheduler ──► FrameEncoder ──► FrameSink ──► HTTP body
//!              (ids, chunking,    (invariants,     (mpsc of
//!               cancellation)      SSE lines)       Bytes)
//! ```
//!
//! Whatever ends the turn, the stream is always closed with `finish`
//! followed by `data: [DONE]`.

pub mod chunking;
pub mod encoder;
pub mod error;
pub mod frames;
pub mod invocation;
pub mod scheduler;
pub mod sse;

pub use chunking::{ChunkPolicy, DeltaKind, RandomChunks, SharedChunkPolicy, WholeChunks};
pub use encoder::FrameEncoder;
pub use error::{ProtocolError, Result};
pub use frames::UiFrame;
pub use invocation::{CANCELLED_ERROR_TEXT, ToolInvocation, ToolState};
pub use scheduler::{
    FrameSink, TurnEvent, TurnOutcome, TurnScheduler, TurnStatus, receiver_stream,
};
pub use sse::{STREAM_HEADERS, SseMessage, parse_frames, parse_stream};
