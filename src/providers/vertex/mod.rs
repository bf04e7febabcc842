//! Anthropic Claude models served through Vertex AI.

pub mod anthropic;
pub mod anthropic_types;
pub mod decoder;
pub mod finish;
pub mod request;
pub mod response;
pub mod tool_args;

pub use anthropic::{AnthropicVertexModel, PROVIDER_ID};
pub use decoder::{DecoderState, StreamDecoder};
pub use request::Mode;
