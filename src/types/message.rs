use serde::{Deserialize, Serialize};

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One ordered unit of a message's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Plain text.
    Text { text: String },
    /// A tool invocation previously produced by the model.
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        /// JSON-encoded arguments.
        args_json: String,
    },
    /// The outcome of running a tool, sent back to the model.
    ToolResult {
        tool_call_id: String,
        value: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
    ) -> Self {
        ContentPart::ToolCall {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args_json: args_json.into(),
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        ContentPart::ToolResult {
            tool_call_id: tool_call_id.into(),
            value: value.into(),
            is_error: false,
        }
    }

    /// A tool result reporting that the tool itself failed.
    pub fn tool_error(
        tool_call_id: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        ContentPart::ToolResult {
            tool_call_id: tool_call_id.into(),
            value: value.into(),
            is_error: true,
        }
    }
}

/// A conversation turn: a role plus ordered content parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    /// Create a new message with a single text part.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Message {
            role,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create a message from explicit content parts.
    pub fn with_parts(role: Role, content: Vec<ContentPart>) -> Self {
        Message { role, content }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Append a content part.
    pub fn push(mut self, part: ContentPart) -> Self {
        self.content.push(part);
        self
    }

    /// Concatenated text of all text parts, in order.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Tool definition for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool input, passed through unmodified.
    pub parameters: serde_json::Value,
}

impl ToolDeclaration {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// How the model may use the declared tools.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    /// The model must call some tool.
    Required,
    /// Tools are withheld from the model for this call.
    None,
    /// The model must call the named tool.
    Tool { name: String },
}
