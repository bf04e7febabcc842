//! Assembles streamed tool-call arguments.

use crate::types::{ChunkError, ToolCall};

/// Accumulates `input_json_delta` fragments for one open tool-use block.
#[derive(Debug, Clone)]
pub struct ToolArgsAssembler {
    tool_call_id: String,
    tool_name: String,
    buffer: String,
    /// The buffer holds input from `content_block_start` rather than streamed fragments.
    seeded: bool,
}

impl ToolArgsAssembler {
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            buffer: String::new(),
            seeded: false,
        }
    }

    /// Start from the `input` carried by `content_block_start`. Only a non-empty
    /// object seeds the buffer, and the first streamed fragment replaces it.
    pub fn with_initial_input(mut self, input: &serde_json::Value) -> Self {
        if input.as_object().is_some_and(|object| !object.is_empty()) {
            self.buffer = input.to_string();
            self.seeded = true;
        }
        self
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    /// Append one partial JSON fragment.
    pub fn push(&mut self, fragment: &str) {
        if self.seeded {
            self.buffer.clear();
            self.seeded = false;
        }
        self.buffer.push_str(fragment);
    }

    /// Close the block. The returned call carries the accumulated string unchanged;
    /// the error is set when that string is not valid JSON.
    pub fn finish(self) -> (ToolCall, Option<ChunkError>) {
        let args_json = if self.buffer.trim().is_empty() {
            "{}".to_string()
        } else {
            self.buffer
        };

        let error = match serde_json::from_str::<serde_json::Value>(&args_json) {
            Ok(_) => None,
            Err(_) => Some(ChunkError::ToolArgumentsInvalid {
                tool_call_id: self.tool_call_id.clone(),
                raw: args_json.clone(),
            }),
        };

        let call = ToolCall {
            tool_call_id: self.tool_call_id,
            tool_name: self.tool_name,
            args_json,
        };
        (call, error)
    }
}
