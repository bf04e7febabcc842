//! Anthropic Claude on Google Vertex AI behind a normalized language-model interface.
//!
//! Canonical requests are translated to `rawPredict` / `streamRawPredict` calls, and
//! responses and live event streams are translated back into a [`GenerationResult`] or
//! a stream of [`StreamChunk`]s, including incremental tool-call arguments.

pub mod accumulator;
pub mod auth;
pub mod error;
pub mod factory;
pub mod provider;
pub mod providers;
pub mod sse_stream;
pub mod transport;
pub mod types;

// Re-export core types for easy usage
pub use accumulator::ResponseAccumulator;
pub use auth::{GcpTokenSupplier, StaticToken, TokenSupplier};
pub use error::Error;
pub use factory::{AnthropicVertexProvider, ProviderSettings};
pub use provider::LanguageModel;
pub use providers::*;
pub use sse_stream::SseEvent;
pub use transport::{ReqwestTransport, Transport, TransportResponse, WireRequest};
pub use types::*;
