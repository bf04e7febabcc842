use super::config::CallSettings;
use super::message::{Message, ToolChoice, ToolDeclaration};
use super::prompt::Prompt;

/// A canonical generation request, independent of the backend wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDeclaration>>,
    pub tool_choice: Option<ToolChoice>,
    pub settings: CallSettings,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: None,
            tool_choice: None,
            settings: CallSettings::default(),
        }
    }

    /// Build a request from the messages of a prompt.
    pub fn from_prompt(prompt: &Prompt) -> Self {
        Self::new(prompt.messages().to_vec())
    }

    pub fn tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.settings.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.settings.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.settings.top_p = Some(top_p);
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.settings.top_k = Some(top_k);
        self
    }

    pub fn stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.settings.stop_sequences = Some(stop);
        self
    }
}
