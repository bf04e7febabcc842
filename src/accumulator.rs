//! Folding a chunk stream back into a complete result.

use futures_util::{Stream, StreamExt};

use crate::types::{FinishReason, GenerationResult, StreamChunk, ToolCall, Usage};
use crate::Error;

/// Accumulates streamed chunks into a [`GenerationResult`].
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    text: String,
    tool_calls: Vec<ToolCall>,
    finish: Option<(FinishReason, Usage)>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one chunk. A fatal error chunk is returned as `Err`; a non-fatal one
    /// (invalid tool arguments) is skipped since its tool call chunk follows.
    pub fn push(&mut self, chunk: StreamChunk) -> Result<(), Error> {
        match chunk {
            StreamChunk::TextDelta { delta } => self.text.push_str(&delta),
            StreamChunk::ToolCall { call } => self.tool_calls.push(call),
            StreamChunk::Finish {
                finish_reason,
                usage,
            } => self.finish = Some((finish_reason, usage)),
            StreamChunk::Error { error } if error.is_fatal() => return Err(error.into()),
            StreamChunk::Error { error } => {
                tracing::debug!(error = %error, "skipping non-fatal stream error");
            }
        }
        Ok(())
    }

    /// Text received so far.
    pub fn current_text(&self) -> &str {
        &self.text
    }

    /// Completed tool calls received so far.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }

    /// Build the result. Fails if no finish chunk was seen.
    pub fn finalize(self) -> Result<GenerationResult, Error> {
        let (finish_reason, usage) = self
            .finish
            .ok_or_else(|| Error::protocol("stream ended without a finish chunk"))?;

        Ok(GenerationResult {
            text: self.text,
            tool_calls: self.tool_calls,
            finish_reason,
            usage,
        })
    }

    /// Drain a chunk stream into a result.
    pub async fn collect<S>(stream: S) -> Result<GenerationResult, Error>
    where
        S: Stream<Item = StreamChunk>,
    {
        let mut accumulator = Self::new();
        let mut stream = std::pin::pin!(stream);
        while let Some(chunk) = stream.next().await {
            let terminal = chunk.is_terminal();
            accumulator.push(chunk)?;
            if terminal {
                break;
            }
        }
        accumulator.finalize()
    }
}
