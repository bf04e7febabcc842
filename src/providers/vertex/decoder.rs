//! Decoding of `streamRawPredict` events into canonical chunks.
//!
//! The decoder is a state machine driven one backend event at a time:
//!
//! ```text
//! Idle -> Started -> (block start/delta/stop)* -> MessageDeltaSeen -> Stopped
//! ```
//!
//! Every call to [`StreamDecoder::decode`] returns the chunks caused by that event, in
//! order. After a terminal chunk (`Finish` or a fatal `Error`) the decoder is `Stopped`
//! and ignores everything else.

use std::collections::{HashMap, HashSet};

use super::anthropic_types::{AnthropicContentDelta, AnthropicStreamEvent, ResponseContentBlock};
use super::finish::{map_finish_reason, map_usage};
use super::tool_args::ToolArgsAssembler;
use crate::types::{ChunkError, StreamChunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Started,
    MessageDeltaSeen,
    Stopped,
}

/// State of one open content block.
#[derive(Debug)]
enum OpenBlock {
    Text,
    ToolUse(ToolArgsAssembler),
    /// A block kind this adapter does not translate; its deltas are dropped.
    Ignored,
}

/// Open content blocks keyed by their wire index. Lives for one stream only.
/// An index may be opened once per stream, even after its block was closed.
#[derive(Debug, Default)]
struct BlockRegistry {
    blocks: HashMap<u32, OpenBlock>,
    seen: HashSet<u32>,
}

impl BlockRegistry {
    fn open(&mut self, index: u32, block: OpenBlock) -> Result<(), ChunkError> {
        if !self.seen.insert(index) {
            return Err(ChunkError::protocol(format!("content block {index} opened twice")));
        }
        self.blocks.insert(index, block);
        Ok(())
    }

    fn get_mut(&mut self, index: u32) -> Result<&mut OpenBlock, ChunkError> {
        self.blocks
            .get_mut(&index)
            .ok_or_else(|| ChunkError::protocol(format!("content block {index} is not open")))
    }

    fn close(&mut self, index: u32) -> Result<OpenBlock, ChunkError> {
        self.blocks
            .remove(&index)
            .ok_or_else(|| ChunkError::protocol(format!("content block {index} is not open")))
    }

    fn open_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.blocks.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.seen.clear();
    }
}

/// Per-call decoder for the Anthropic event stream.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecoderState,
    registry: BlockRegistry,
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    stop_reason: Option<String>,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            registry: BlockRegistry::default(),
            prompt_tokens: None,
            completion_tokens: None,
            stop_reason: None,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Whether a terminal chunk has been produced.
    pub fn is_stopped(&self) -> bool {
        self.state == DecoderState::Stopped
    }

    /// Decode the `data` payload of one SSE event.
    pub fn decode_payload(&mut self, data: &str) -> Vec<StreamChunk> {
        if self.is_stopped() {
            return Vec::new();
        }

        let data = data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        tracing::trace!(data, "anthropic stream event");

        match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(event) => self.decode(event),
            Err(e) => self.violation(ChunkError::protocol(format!(
                "Unparseable stream event: {e}"
            ))),
        }
    }

    /// Apply one backend event and return the chunks it causes.
    pub fn decode(&mut self, event: AnthropicStreamEvent) -> Vec<StreamChunk> {
        if self.is_stopped() {
            return Vec::new();
        }

        match self.apply(event) {
            Ok(chunks) => chunks,
            Err(error) => self.violation(error),
        }
    }

    /// Terminate with an error that did not come from an event (e.g. the byte stream failed).
    pub fn fail(&mut self, error: ChunkError) -> Vec<StreamChunk> {
        if self.is_stopped() {
            return Vec::new();
        }
        self.terminate();
        vec![StreamChunk::error(error)]
    }

    /// Signal that the event source is exhausted.
    pub fn finish_input(&mut self) -> Vec<StreamChunk> {
        if self.is_stopped() {
            return Vec::new();
        }
        self.violation(ChunkError::protocol("stream ended before message_stop"))
    }

    fn apply(&mut self, event: AnthropicStreamEvent) -> Result<Vec<StreamChunk>, ChunkError> {
        let mut chunks = Vec::new();

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                if self.state != DecoderState::Idle {
                    return Err(ChunkError::protocol("duplicate message_start"));
                }
                self.prompt_tokens = message.usage.and_then(|usage| usage.input_tokens);
                self.state = DecoderState::Started;
            }
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                self.require_started("content_block_start")?;
                let block = match content_block {
                    ResponseContentBlock::Text { text } => {
                        if !text.is_empty() {
                            chunks.push(StreamChunk::TextDelta { delta: text });
                        }
                        OpenBlock::Text
                    }
                    ResponseContentBlock::ToolUse { id, name, input } => OpenBlock::ToolUse(
                        ToolArgsAssembler::new(id, name).with_initial_input(&input),
                    ),
                    ResponseContentBlock::Unknown => OpenBlock::Ignored,
                };
                self.registry.open(index, block)?;
            }
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
                self.require_started("content_block_delta")?;
                match (self.registry.get_mut(index)?, delta) {
                    (OpenBlock::Text, AnthropicContentDelta::TextDelta { text }) => {
                        chunks.push(StreamChunk::TextDelta { delta: text });
                    }
                    (
                        OpenBlock::ToolUse(assembler),
                        AnthropicContentDelta::InputJsonDelta { partial_json },
                    ) => assembler.push(&partial_json),
                    (OpenBlock::Ignored, _) | (_, AnthropicContentDelta::Unknown) => {}
                    (OpenBlock::Text, AnthropicContentDelta::InputJsonDelta { .. }) => {
                        return Err(ChunkError::protocol(format!(
                            "input_json_delta for text block {index}"
                        )));
                    }
                    (OpenBlock::ToolUse(_), AnthropicContentDelta::TextDelta { .. }) => {
                        return Err(ChunkError::protocol(format!(
                            "text_delta for tool_use block {index}"
                        )));
                    }
                }
            }
            AnthropicStreamEvent::ContentBlockStop { index } => {
                self.require_started("content_block_stop")?;
                if let OpenBlock::ToolUse(assembler) = self.registry.close(index)? {
                    let (call, error) = assembler.finish();
                    if let Some(error) = error {
                        tracing::warn!(
                            tool_call_id = %call.tool_call_id,
                            tool_name = %call.tool_name,
                            "tool call arguments are not valid JSON"
                        );
                        chunks.push(StreamChunk::error(error));
                    }
                    chunks.push(StreamChunk::ToolCall { call });
                }
            }
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                self.require_started("message_delta")?;
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    if usage.output_tokens.is_some() {
                        self.completion_tokens = usage.output_tokens;
                    }
                    if self.prompt_tokens.is_none() {
                        self.prompt_tokens = usage.input_tokens;
                    }
                }
                self.state = DecoderState::MessageDeltaSeen;
            }
            AnthropicStreamEvent::MessageStop => {
                self.require_started("message_stop")?;
                let open = self.registry.open_indices();
                if !open.is_empty() {
                    return Err(ChunkError::protocol(format!(
                        "message_stop with open content blocks {open:?}"
                    )));
                }
                chunks.push(StreamChunk::Finish {
                    finish_reason: map_finish_reason(self.stop_reason.as_deref()),
                    usage: map_usage(self.prompt_tokens, self.completion_tokens),
                });
                self.terminate();
            }
            AnthropicStreamEvent::Error { error } => {
                tracing::warn!(kind = %error.kind, message = %error.message, "backend stream error");
                self.terminate();
                chunks.push(StreamChunk::error(ChunkError::Backend {
                    kind: error.kind,
                    message: error.message,
                }));
            }
            AnthropicStreamEvent::Ping | AnthropicStreamEvent::Unknown => {}
        }

        Ok(chunks)
    }

    fn require_started(&self, event: &str) -> Result<(), ChunkError> {
        if self.state == DecoderState::Idle {
            return Err(ChunkError::protocol(format!(
                "{event} received before message_start"
            )));
        }
        Ok(())
    }

    fn violation(&mut self, error: ChunkError) -> Vec<StreamChunk> {
        tracing::warn!(error = %error, "terminating stream");
        self.terminate();
        vec![StreamChunk::error(error)]
    }

    fn terminate(&mut self) {
        self.state = DecoderState::Stopped;
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FinishReason, ToolCall, Usage};

    fn decode_all(decoder: &mut StreamDecoder, payloads: &[&str]) -> Vec<StreamChunk> {
        payloads
            .iter()
            .flat_map(|payload| decoder.decode_payload(payload))
            .collect()
    }

    fn message_start(input_tokens: u32) -> String {
        format!(
            r#"{{"type":"message_start","message":{{"id":"msg_1","type":"message","role":"assistant","model":"claude-3-5-sonnet","content":[],"stop_reason":null,"usage":{{"input_tokens":{input_tokens},"output_tokens":1}}}}}}"#
        )
    }

    fn text_delta(index: u32, text: &str) -> String {
        format!(
            r#"{{"type":"content_block_delta","index":{index},"delta":{{"type":"text_delta","text":{}}}}}"#,
            serde_json::to_string(text).unwrap()
        )
    }

    fn json_delta(index: u32, partial: &str) -> String {
        format!(
            r#"{{"type":"content_block_delta","index":{index},"delta":{{"type":"input_json_delta","partial_json":{}}}}}"#,
            serde_json::to_string(partial).unwrap()
        )
    }

    fn message_delta(stop_reason: &str, output_tokens: u32) -> String {
        format!(
            r#"{{"type":"message_delta","delta":{{"stop_reason":"{stop_reason}","stop_sequence":null}},"usage":{{"output_tokens":{output_tokens}}}}}"#
        )
    }

    const TEXT_START_0: &str =
        r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#;
    const STOP_0: &str = r#"{"type":"content_block_stop","index":0}"#;
    const MESSAGE_STOP: &str = r#"{"type":"message_stop"}"#;

    fn tool_start(index: u32, id: &str, name: &str) -> String {
        format!(
            r#"{{"type":"content_block_start","index":{index},"content_block":{{"type":"tool_use","id":"{id}","name":"{name}","input":{{}}}}}}"#
        )
    }

    #[test]
    fn test_text_stream_scenario() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[
                &message_start(15),
                TEXT_START_0,
                &text_delta(0, "Embedding"),
                &text_delta(0, " models"),
                &text_delta(0, " are"),
                STOP_0,
                &message_delta("stop", 10),
                MESSAGE_STOP,
            ],
        );

        assert_eq!(
            chunks,
            vec![
                StreamChunk::TextDelta {
                    delta: "Embedding".to_string()
                },
                StreamChunk::TextDelta {
                    delta: " models".to_string()
                },
                StreamChunk::TextDelta {
                    delta: " are".to_string()
                },
                StreamChunk::Finish {
                    finish_reason: FinishReason::Stop,
                    usage: Usage {
                        prompt_tokens: 15,
                        completion_tokens: 10
                    },
                },
            ]
        );
        assert!(decoder.is_stopped());
    }

    #[test]
    fn test_state_transitions() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.state(), DecoderState::Idle);
        decoder.decode_payload(&message_start(1));
        assert_eq!(decoder.state(), DecoderState::Started);
        decoder.decode_payload(&message_delta("end_turn", 2));
        assert_eq!(decoder.state(), DecoderState::MessageDeltaSeen);
        decoder.decode_payload(MESSAGE_STOP);
        assert_eq!(decoder.state(), DecoderState::Stopped);
    }

    #[test]
    fn test_seed_text_emitted_as_delta() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[
                &message_start(1),
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":"Hi"}}"#,
            ],
        );
        assert_eq!(
            chunks,
            vec![StreamChunk::TextDelta {
                delta: "Hi".to_string()
            }]
        );
    }

    #[test]
    fn test_tool_call_assembled_from_fragments() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[
                &message_start(20),
                TEXT_START_0,
                &text_delta(0, "Let me check."),
                STOP_0,
                &tool_start(1, "toolu_1", "celsiusToFahrenheit"),
                &json_delta(1, ""),
                &json_delta(1, "{\"value\""),
                &json_delta(1, ": \"30\"}"),
                r#"{"type":"content_block_stop","index":1}"#,
                &message_delta("tool_use", 15),
                MESSAGE_STOP,
            ],
        );

        assert_eq!(
            chunks,
            vec![
                StreamChunk::TextDelta {
                    delta: "Let me check.".to_string()
                },
                StreamChunk::ToolCall {
                    call: ToolCall::new("toolu_1", "celsiusToFahrenheit", "{\"value\": \"30\"}"),
                },
                StreamChunk::Finish {
                    finish_reason: FinishReason::ToolCalls,
                    usage: Usage {
                        prompt_tokens: 20,
                        completion_tokens: 15
                    },
                },
            ]
        );
    }

    #[test]
    fn test_interleaved_blocks_keep_separate_buffers() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[
                &message_start(1),
                &tool_start(0, "toolu_a", "a"),
                &tool_start(1, "toolu_b", "b"),
                &json_delta(0, "{\"x\":"),
                &json_delta(1, "{\"y\":2}"),
                &json_delta(0, "1}"),
                r#"{"type":"content_block_stop","index":1}"#,
                STOP_0,
            ],
        );

        assert_eq!(
            chunks,
            vec![
                StreamChunk::ToolCall {
                    call: ToolCall::new("toolu_b", "b", "{\"y\":2}")
                },
                StreamChunk::ToolCall {
                    call: ToolCall::new("toolu_a", "a", "{\"x\":1}")
                },
            ]
        );
    }

    #[test]
    fn test_invalid_tool_arguments_are_not_fatal() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[
                &message_start(5),
                &tool_start(0, "toolu_bad", "lookup"),
                &json_delta(0, "{\"q\": \"unterminated"),
                STOP_0,
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#,
                &text_delta(1, "still here"),
                r#"{"type":"content_block_stop","index":1}"#,
                &message_delta("tool_use", 7),
                MESSAGE_STOP,
            ],
        );

        assert_eq!(chunks.len(), 4);
        assert_eq!(
            chunks[0],
            StreamChunk::Error {
                error: ChunkError::ToolArgumentsInvalid {
                    tool_call_id: "toolu_bad".to_string(),
                    raw: "{\"q\": \"unterminated".to_string(),
                }
            }
        );
        assert_eq!(
            chunks[1],
            StreamChunk::ToolCall {
                call: ToolCall::new("toolu_bad", "lookup", "{\"q\": \"unterminated"),
            }
        );
        assert_eq!(
            chunks[2],
            StreamChunk::TextDelta {
                delta: "still here".to_string()
            }
        );
        assert!(matches!(chunks[3], StreamChunk::Finish { .. }));
    }

    #[test]
    fn test_backend_error_terminates_early() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[
                &message_start(5),
                TEXT_START_0,
                &text_delta(0, "partial"),
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
                &text_delta(0, "ignored"),
                MESSAGE_STOP,
            ],
        );

        assert_eq!(
            chunks,
            vec![
                StreamChunk::TextDelta {
                    delta: "partial".to_string()
                },
                StreamChunk::Error {
                    error: ChunkError::Backend {
                        kind: "overloaded_error".to_string(),
                        message: "Overloaded".to_string(),
                    }
                },
            ]
        );
        assert!(decoder.finish_input().is_empty());
    }

    #[test]
    fn test_ping_and_unknown_events_ignored() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[
                r#"{"type":"ping"}"#,
                &message_start(2),
                r#"{"type":"ping"}"#,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"hmm"}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"abc"}}"#,
                STOP_0,
                r#"{"type":"future_event","data":1}"#,
                &message_delta("end_turn", 3),
                MESSAGE_STOP,
            ],
        );

        assert_eq!(
            chunks,
            vec![StreamChunk::Finish {
                finish_reason: FinishReason::Stop,
                usage: Usage {
                    prompt_tokens: 2,
                    completion_tokens: 3
                },
            }]
        );
    }

    #[test]
    fn test_missing_message_delta_reports_other() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(&mut decoder, &[&message_start(4), MESSAGE_STOP]);
        assert_eq!(
            chunks,
            vec![StreamChunk::Finish {
                finish_reason: FinishReason::Other,
                usage: Usage {
                    prompt_tokens: 4,
                    completion_tokens: 0
                },
            }]
        );
    }

    fn assert_single_violation(chunks: Vec<StreamChunk>) {
        assert_eq!(chunks.len(), 1, "expected one chunk, got {chunks:?}");
        assert!(
            matches!(
                &chunks[0],
                StreamChunk::Error {
                    error: ChunkError::ProtocolViolation { .. }
                }
            ),
            "expected protocol violation, got {chunks:?}"
        );
    }

    #[test]
    fn test_block_before_message_start_is_violation() {
        let mut decoder = StreamDecoder::new();
        assert_single_violation(decode_all(&mut decoder, &[TEXT_START_0]));
        assert!(decoder.is_stopped());
    }

    #[test]
    fn test_delta_for_unopened_block_is_violation() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_payload(&message_start(1));
        assert_single_violation(decoder.decode_payload(&text_delta(3, "x")));
    }

    #[test]
    fn test_block_opened_twice_is_violation() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_payload(&message_start(1));
        decoder.decode_payload(TEXT_START_0);
        assert_single_violation(decoder.decode_payload(TEXT_START_0));
    }

    #[test]
    fn test_closed_block_reopened_is_violation() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[&message_start(1), TEXT_START_0, &text_delta(0, "a"), STOP_0],
        );
        assert_eq!(chunks.len(), 1);
        assert_single_violation(decoder.decode_payload(&tool_start(0, "toolu_1", "lookup")));
        assert!(decoder.is_stopped());
    }

    #[test]
    fn test_delta_kind_mismatch_is_violation() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_payload(&message_start(1));
        decoder.decode_payload(TEXT_START_0);
        assert_single_violation(decoder.decode_payload(&json_delta(0, "{}")));
    }

    #[test]
    fn test_message_stop_with_open_block_is_violation() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_payload(&message_start(1));
        decoder.decode_payload(TEXT_START_0);
        assert_single_violation(decoder.decode_payload(MESSAGE_STOP));
    }

    #[test]
    fn test_unparseable_payload_is_violation() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_payload(&message_start(1));
        assert_single_violation(
            decoder.decode_payload("{\"type\":\"content_block_delta\",\"index\":"),
        );
    }

    #[test]
    fn test_truncated_stream_is_violation() {
        let mut decoder = StreamDecoder::new();
        let chunks = decode_all(
            &mut decoder,
            &[&message_start(1), TEXT_START_0, &text_delta(0, "a")],
        );
        assert_eq!(chunks.len(), 1);
        assert_single_violation(decoder.finish_input());
        assert!(decoder.finish_input().is_empty());
    }

    #[test]
    fn test_nothing_after_finish() {
        let mut decoder = StreamDecoder::new();
        decode_all(&mut decoder, &[&message_start(1), MESSAGE_STOP]);
        assert!(decoder.decode_payload(TEXT_START_0).is_empty());
        assert!(decoder
            .fail(ChunkError::Transport {
                message: "late".to_string()
            })
            .is_empty());
    }

    #[test]
    fn test_text_delta_count_matches_events() {
        let pieces = ["a", "", "bc", " d", "é"];
        let mut payloads = vec![message_start(1), TEXT_START_0.to_string()];
        payloads.extend(pieces.iter().map(|p| text_delta(0, p)));

        let mut decoder = StreamDecoder::new();
        let payload_refs: Vec<&str> = payloads.iter().map(String::as_str).collect();
        let chunks = decode_all(&mut decoder, &payload_refs);

        let deltas: Vec<&str> = chunks
            .iter()
            .filter_map(|chunk| match chunk {
                StreamChunk::TextDelta { delta } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas.len(), pieces.len());
        assert_eq!(deltas.concat(), pieces.concat());
    }
}
