//! `rawPredict` response body → canonical result.

use super::anthropic_types::{AnthropicResponse, ResponseContentBlock};
use super::finish::{map_finish_reason, map_usage};
use crate::types::{GenerationResult, ToolCall};
use crate::Error;

/// Parse a response body, treating any shape mismatch as a protocol violation.
pub fn parse_response(body: &[u8]) -> Result<AnthropicResponse, Error> {
    serde_json::from_slice(body)
        .map_err(|e| Error::protocol(format!("Unexpected response body: {e}")))
}

/// Convert a parsed response to a canonical result.
pub fn map_response(response: AnthropicResponse) -> Result<GenerationResult, Error> {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ResponseContentBlock::Text { text: part } => text.push_str(&part),
            ResponseContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall {
                    tool_call_id: id,
                    tool_name: name,
                    args_json: serde_json::to_string(&input)?,
                });
            }
            ResponseContentBlock::Unknown => {}
        }
    }

    let usage = response.usage.unwrap_or_default();

    Ok(GenerationResult {
        text,
        tool_calls,
        finish_reason: map_finish_reason(response.stop_reason.as_deref()),
        usage: map_usage(usage.input_tokens, usage.output_tokens),
    })
}
