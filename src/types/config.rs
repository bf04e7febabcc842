use std::collections::BTreeMap;

/// Default `max_tokens` sent when the caller does not set one; the backend requires the field.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Resolved, immutable connection settings for Anthropic models on Vertex AI.
///
/// Produced by [`crate::factory::ProviderSettings`]; the adapter only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexConfig {
    pub project_id: String,
    /// GCP region, e.g. "us-east5" or "europe-west1".
    pub location: String,
    /// Base URL with placeholders already substituted and no trailing slash.
    pub base_url: String,
    /// Static headers added to every request.
    pub headers: BTreeMap<String, String>,
}

impl VertexConfig {
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            base_url: format!("https://{location}-aiplatform.googleapis.com/v1"),
            project_id: project_id.into(),
            location,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Per-call generation parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
}
