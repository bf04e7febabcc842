//! Stop-reason and usage normalization shared by the response mapper and the stream decoder.

use crate::types::{FinishReason, Usage};

/// Map a backend stop reason to a canonical finish reason.
///
/// `stop` is treated like `end_turn`.
pub fn map_finish_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("end_turn" | "stop_sequence" | "stop") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        _ => FinishReason::Other,
    }
}

/// Build canonical usage from backend token counts; missing counts are zero.
pub fn map_usage(input_tokens: Option<u32>, output_tokens: Option<u32>) -> Usage {
    Usage {
        prompt_tokens: input_tokens.unwrap_or(0),
        completion_tokens: output_tokens.unwrap_or(0),
    }
}
