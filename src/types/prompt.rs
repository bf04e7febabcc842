use super::message::{ContentPart, Message, Role};
use super::result::GenerationResult;

/// A conversation under construction: an ordered list of messages.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    messages: Vec<Message>,
}

impl Prompt {
    /// Create a new empty prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a prompt with a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(content)],
        }
    }

    /// Create a prompt with a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
        }
    }

    pub fn with_user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn with_assistant(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Append the model's previous answer as an assistant turn.
    pub fn with_result(mut self, result: &GenerationResult) -> Self {
        self.messages.push(result.to_message());
        self
    }

    /// Append the output of a tool as a user turn.
    pub fn with_tool_result(
        mut self,
        tool_call_id: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.messages.push(Message::with_parts(
            Role::User,
            vec![ContentPart::tool_result(tool_call_id, value)],
        ));
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Prompt::user(s)
    }
}

impl From<String> for Prompt {
    fn from(s: String) -> Self {
        Prompt::user(s)
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Prompt { messages }
    }
}
