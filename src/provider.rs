use crate::types::{ChunkStream, GenerationRequest, GenerationResult};
use crate::Error;

/// A language model reachable through some backend.
///
/// `generate` returns the complete result of one call. `stream` returns a chunk
/// stream that never fails up front: every failure, including request mapping and
/// authentication, arrives as a fatal `StreamChunk::Error`.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Backend identifier, e.g. `anthropic.vertex`.
    fn provider(&self) -> &str;

    fn model_id(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, Error>;

    fn stream(&self, request: &GenerationRequest) -> ChunkStream;
}
