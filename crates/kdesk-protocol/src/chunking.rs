//! Delta sub-chunking policies.
//!
//! Consumers rebuild text by concatenating deltas in order, so a single
//! upstream chunk may be split at any character boundary. Tests use
//! [`WholeChunks`]; the demo stream uses [`RandomChunks`] to imitate token
//! streaming.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// What a delta carries; policies may split each kind differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Text,
    ToolInput,
}

/// Splits delta content into sub-chunks and paces their emission.
pub trait ChunkPolicy: Send + Sync {
    /// Split `content` into pieces whose concatenation equals `content`.
    fn split(&self, kind: DeltaKind, content: &str) -> Vec<String>;

    /// Pause to take before emitting the next frame.
    fn pause(&self) -> Option<Duration> {
        None
    }
}

pub type SharedChunkPolicy = Arc<dyn ChunkPolicy>;

/// Emits every upstream chunk as-is, without pauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeChunks;

impl ChunkPolicy for WholeChunks {
    fn split(&self, _kind: DeltaKind, content: &str) -> Vec<String> {
        if content.is_empty() {
            Vec::new()
        } else {
            vec![content.to_string()]
        }
    }
}

/// Splits into random runs of characters and sleeps a random interval
/// between frames.
#[derive(Debug, Clone)]
pub struct RandomChunks {
    text: RangeInclusive<usize>,
    tool_input: RangeInclusive<usize>,
    max_delay: Duration,
}

impl RandomChunks {
    /// Text and tool input both split into runs of `min..=max` characters.
    ///
    /// Bounds are clamped so that every run has at least one character.
    pub fn new(min: usize, max: usize) -> Self {
        let range = clamp_range(min, max);
        Self {
            text: range.clone(),
            tool_input: range,
            max_delay: Duration::ZERO,
        }
    }

    pub fn with_tool_input_range(mut self, min: usize, max: usize) -> Self {
        self.tool_input = clamp_range(min, max);
        self
    }

    /// Sleep up to `max_delay` (uniformly, inclusive) between frames.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

fn clamp_range(min: usize, max: usize) -> RangeInclusive<usize> {
    let min = min.max(1);
    min..=max.max(min)
}

impl ChunkPolicy for RandomChunks {
    fn split(&self, kind: DeltaKind, content: &str) -> Vec<String> {
        let range = match kind {
            DeltaKind::Text => self.text.clone(),
            DeltaKind::ToolInput => self.tool_input.clone(),
        };
        let mut rng = rand::rng();
        let mut chunks = Vec::new();
        let mut chars = content.chars().peekable();
        while chars.peek().is_some() {
            let size = rng.random_range(range.clone());
            chunks.push(chars.by_ref().take(size).collect());
        }
        chunks
    }

    fn pause(&self) -> Option<Duration> {
        if self.max_delay.is_zero() {
            return None;
        }
        let max_ms = self.max_delay.as_millis() as u64;
        let ms = rand::rng().random_range(0..=max_ms);
        (ms > 0).then(|| Duration::from_millis(ms))
    }
}
