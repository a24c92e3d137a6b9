//! Error types for stream framing.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame would break the stream's structure (unpaired part, tool
    /// state regression, content outside a step, ...). Always a bug in the
    /// producer.
    #[error("framing invariant violated: {0}")]
    Invariant(String),

    /// The consumer went away; nothing more can be delivered.
    #[error("stream consumer disconnected")]
    SinkClosed,

    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// A line read back from a stream was not a valid frame.
    #[error("malformed stream line: {0}")]
    Decode(String),
}

impl ProtocolError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}
