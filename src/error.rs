use thiserror::Error;

/// Errors that can occur when calling Anthropic models through Vertex AI.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bearer token unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Streaming error: {0}")]
    Streaming(String),
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Error::AuthUnavailable(message.into())
    }

    pub fn request_failed(status: u16, body: impl Into<String>) -> Self {
        Error::RequestFailed {
            status,
            body: body.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Error::ProtocolViolation(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }
}
