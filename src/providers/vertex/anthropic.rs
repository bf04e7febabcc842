use async_stream::stream;
use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;

use super::decoder::StreamDecoder;
use super::request::{build_wire_request, Mode};
use super::response::{map_response, parse_response};
use crate::auth::TokenSupplier;
use crate::provider::LanguageModel;
use crate::sse_stream::SseStreamExt;
use crate::transport::{Transport, TransportResponse};
use crate::types::{ChunkStream, GenerationRequest, GenerationResult, StreamChunk, VertexConfig};
use crate::Error;

/// Provider identifier reported by [`AnthropicVertexModel`].
pub const PROVIDER_ID: &str = "anthropic.vertex";

/// One Anthropic Claude model served by Vertex AI.
///
/// Holds only shared, immutable collaborators. All per-call state (the stream
/// decoder and its open blocks) lives inside the future or stream of that call.
#[derive(Clone)]
pub struct AnthropicVertexModel {
    model_id: String,
    config: Arc<VertexConfig>,
    token_supplier: Arc<dyn TokenSupplier>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for AnthropicVertexModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicVertexModel")
            .field("model_id", &self.model_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AnthropicVertexModel {
    pub fn new(
        model_id: impl Into<String>,
        config: Arc<VertexConfig>,
        token_supplier: Arc<dyn TokenSupplier>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            config,
            token_supplier,
            transport,
        }
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    /// Fetch a token, build the call and execute it. Non-success statuses become
    /// `Error::RequestFailed` carrying the response body.
    async fn send(
        &self,
        request: &GenerationRequest,
        mode: Mode,
    ) -> Result<TransportResponse, Error> {
        let token = self.token_supplier.bearer_token().await?;
        let wire = build_wire_request(&self.config, &self.model_id, request, mode, &token)?;

        tracing::debug!(
            url = %wire.url,
            model = %self.model_id,
            stream = mode.is_stream(),
            "sending request"
        );

        let response = self.transport.send(&wire).await?;
        if response.is_success() {
            return Ok(response);
        }

        let status = response.status;
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("<failed to read error body: {e}>"),
        };
        tracing::warn!(status, body = %body, "request failed");
        Err(Error::request_failed(status, body))
    }
}

#[async_trait::async_trait]
impl LanguageModel for AnthropicVertexModel {
    fn provider(&self) -> &str {
        PROVIDER_ID
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, Error> {
        let response = self.send(request, Mode::Generate).await?;
        let body = response.bytes().await?;
        map_response(parse_response(&body)?)
    }

    fn stream(&self, request: &GenerationRequest) -> ChunkStream {
        let model = self.clone();
        let request = request.clone();

        Box::pin(stream! {
            let response = match model.send(&request, Mode::Stream).await {
                Ok(response) => response,
                Err(e) => {
                    yield StreamChunk::error(e);
                    return;
                }
            };

            let mut decoder = StreamDecoder::new();
            let mut events = response.body.sse_events();

            while let Some(event) = events.next().await {
                let chunks = match event {
                    Ok(event) => decoder.decode_payload(&event.data),
                    Err(e) => decoder.fail(e.into()),
                };
                for chunk in chunks {
                    yield chunk;
                }
                if decoder.is_stopped() {
                    return;
                }
            }

            for chunk in decoder.finish_input() {
                yield chunk;
            }
        })
    }
}
