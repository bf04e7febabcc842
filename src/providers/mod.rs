//! Backend implementations.

pub mod vertex;

pub use vertex::AnthropicVertexModel;
