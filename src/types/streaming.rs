//! Types for streaming responses.

use futures_util::Stream;
use std::pin::Pin;
use thiserror::Error;

use crate::types::{FinishReason, ToolCall, Usage};
use crate::Error;

/// A boxed stream of canonical chunks, as returned by `LanguageModel::stream`.
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Chunks emitted while a generation streams.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental text, delivered as soon as it arrives.
    TextDelta { delta: String },
    /// A tool call whose arguments have been fully received.
    ToolCall { call: ToolCall },
    /// The stream has finished.
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
    /// An error occurred. Fatal errors end the stream.
    Error { error: ChunkError },
}

impl StreamChunk {
    /// Whether no further chunks may follow this one.
    pub fn is_terminal(&self) -> bool {
        match self {
            StreamChunk::Finish { .. } => true,
            StreamChunk::Error { error } => error.is_fatal(),
            StreamChunk::TextDelta { .. } | StreamChunk::ToolCall { .. } => false,
        }
    }

    pub(crate) fn error(error: impl Into<ChunkError>) -> Self {
        StreamChunk::Error {
            error: error.into(),
        }
    }
}

/// Errors surfaced inside a chunk stream.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkError {
    /// Streamed tool arguments did not form valid JSON. The tool call is still emitted.
    #[error("Tool call {tool_call_id} has invalid arguments: {raw}")]
    ToolArgumentsInvalid { tool_call_id: String, raw: String },

    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    /// An `error` event sent by the backend mid-stream.
    #[error("Backend error ({kind}): {message}")]
    Backend { kind: String, message: String },

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Bearer token unavailable: {message}")]
    AuthUnavailable { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl ChunkError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ChunkError::ToolArgumentsInvalid { .. })
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        ChunkError::ProtocolViolation {
            message: message.into(),
        }
    }
}

impl From<Error> for ChunkError {
    fn from(error: Error) -> Self {
        match error {
            Error::AuthUnavailable(message) => ChunkError::AuthUnavailable { message },
            Error::RequestFailed { status, body } => ChunkError::RequestFailed { status, body },
            Error::ProtocolViolation(message) => ChunkError::ProtocolViolation { message },
            Error::InvalidRequest(message) => ChunkError::InvalidRequest { message },
            Error::Transport(message) | Error::Streaming(message) => {
                ChunkError::Transport { message }
            }
            other => ChunkError::Transport {
                message: other.to_string(),
            },
        }
    }
}

impl From<ChunkError> for Error {
    fn from(error: ChunkError) -> Self {
        match error {
            ChunkError::AuthUnavailable { message } => Error::AuthUnavailable(message),
            ChunkError::RequestFailed { status, body } => Error::RequestFailed { status, body },
            ChunkError::ProtocolViolation { message } => Error::ProtocolViolation(message),
            ChunkError::InvalidRequest { message } => Error::InvalidRequest(message),
            ChunkError::Transport { message } => Error::Transport(message),
            other @ (ChunkError::Backend { .. } | ChunkError::ToolArgumentsInvalid { .. }) => {
                Error::Streaming(other.to_string())
            }
        }
    }
}
