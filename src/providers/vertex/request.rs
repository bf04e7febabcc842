//! Canonical request → Vertex AI `rawPredict` / `streamRawPredict` call.

use super::anthropic_types::*;
use crate::transport::WireRequest;
use crate::types::{
    ContentPart, GenerationRequest, Message, Role, ToolChoice, VertexConfig, DEFAULT_MAX_TOKENS,
};
use crate::Error;

/// Whether a call returns one response body or an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Generate,
    Stream,
}

impl Mode {
    fn method(self) -> &'static str {
        match self {
            Mode::Generate => "rawPredict",
            Mode::Stream => "streamRawPredict",
        }
    }

    pub fn is_stream(self) -> bool {
        self == Mode::Stream
    }
}

/// Get the API endpoint for an Anthropic model.
pub fn endpoint_url(config: &VertexConfig, model_id: &str, mode: Mode) -> String {
    format!(
        "{}/projects/{}/locations/{}/publishers/anthropic/models/{}:{}",
        config.base_url.trim_end_matches('/'),
        config.project_id,
        config.location,
        model_id,
        mode.method()
    )
}

/// Build the complete outbound call for one request.
pub fn build_wire_request(
    config: &VertexConfig,
    model_id: &str,
    request: &GenerationRequest,
    mode: Mode,
    bearer_token: &str,
) -> Result<WireRequest, Error> {
    let body = convert_request(request, mode)?;

    let mut headers = vec![
        ("Authorization".to_string(), format!("Bearer {bearer_token}")),
        ("Content-Type".to_string(), "application/json".to_string()),
    ];
    // Configured headers never override the per-call credentials or body type.
    let fixed: Vec<String> = headers.iter().map(|(name, _)| name.clone()).collect();
    headers.extend(
        config
            .headers
            .iter()
            .filter(|(name, _)| !fixed.iter().any(|taken| taken.eq_ignore_ascii_case(name)))
            .map(|(name, value)| (name.clone(), value.clone())),
    );

    Ok(WireRequest {
        url: endpoint_url(config, model_id, mode),
        headers,
        body: serde_json::to_value(&body)?,
    })
}

/// Convert a canonical request to the Anthropic body format.
pub fn convert_request(request: &GenerationRequest, mode: Mode) -> Result<AnthropicRequest, Error> {
    if request.messages.is_empty() {
        return Err(Error::invalid_request("messages must not be empty"));
    }

    let mut system = None;
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for message in &request.messages {
        let role = match message.role {
            Role::System => {
                if system.is_some() {
                    return Err(Error::invalid_request(
                        "at most one system message is allowed",
                    ));
                }
                system = Some(system_text(message)?);
                continue;
            }
            Role::User => AnthropicRole::User,
            Role::Assistant => AnthropicRole::Assistant,
        };

        let blocks = message
            .content
            .iter()
            .map(convert_part)
            .collect::<Result<Vec<_>, _>>()?;

        // The backend expects alternating roles, so consecutive turns of one role are merged.
        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(AnthropicMessage {
                role,
                content: blocks,
            }),
        }
    }

    if messages.is_empty() {
        return Err(Error::invalid_request(
            "at least one user or assistant message is required",
        ));
    }

    let (tools, tool_choice) = convert_tools(request);
    let settings = &request.settings;

    Ok(AnthropicRequest {
        anthropic_version: VERTEX_ANTHROPIC_VERSION.to_string(),
        messages,
        max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system,
        temperature: settings.temperature,
        top_p: settings.top_p,
        top_k: settings.top_k,
        stop_sequences: settings.stop_sequences.clone(),
        tools,
        tool_choice,
        stream: mode.is_stream(),
    })
}

fn system_text(message: &Message) -> Result<String, Error> {
    let mut texts = Vec::with_capacity(message.content.len());
    for part in &message.content {
        match part {
            ContentPart::Text { text } => texts.push(text.as_str()),
            _ => {
                return Err(Error::invalid_request(
                    "system message may only contain text",
                ))
            }
        }
    }
    Ok(texts.join("\n"))
}

fn convert_part(part: &ContentPart) -> Result<AnthropicContentBlock, Error> {
    Ok(match part {
        ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
        ContentPart::ToolCall {
            tool_call_id,
            tool_name,
            args_json,
        } => {
            let input = if args_json.trim().is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(args_json).map_err(|e| {
                    Error::invalid_request(format!(
                        "Invalid arguments for tool call {tool_call_id}: {e}"
                    ))
                })?
            };
            AnthropicContentBlock::ToolUse {
                id: tool_call_id.clone(),
                name: tool_name.clone(),
                input,
            }
        }
        ContentPart::ToolResult {
            tool_call_id,
            value,
            is_error,
        } => AnthropicContentBlock::ToolResult {
            tool_use_id: tool_call_id.clone(),
            content: match value {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            },
            is_error: *is_error,
        },
    })
}

fn convert_tools(
    request: &GenerationRequest,
) -> (Option<Vec<AnthropicTool>>, Option<AnthropicToolChoice>) {
    let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) else {
        return (None, None);
    };

    let tool_choice = match &request.tool_choice {
        None => None,
        Some(ToolChoice::None) => return (None, None),
        Some(ToolChoice::Auto) => Some(AnthropicToolChoice::Auto),
        Some(ToolChoice::Required) => Some(AnthropicToolChoice::Any),
        Some(ToolChoice::Tool { name }) => Some(AnthropicToolChoice::Tool { name: name.clone() }),
    };

    let tools = tools
        .iter()
        .map(|tool| AnthropicTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.parameters.clone(),
        })
        .collect();

    (Some(tools), tool_choice)
}
