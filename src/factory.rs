use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;

use crate::auth::{GcpTokenSupplier, StaticToken, TokenSupplier};
use crate::providers::vertex::AnthropicVertexModel;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::VertexConfig;
use crate::Error;

/// Environment variable consulted when no project is set explicitly.
pub const PROJECT_ENV: &str = "GOOGLE_VERTEX_PROJECT";
/// Environment variable consulted when no location is set explicitly.
pub const LOCATION_ENV: &str = "GOOGLE_VERTEX_LOCATION";

/// Unresolved provider settings. Anything left unset falls back to the environment
/// when resolved.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    project: Option<String>,
    location: Option<String>,
    base_url: Option<String>,
    headers: BTreeMap<String, String>,
}

impl ProviderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// GCP region, e.g. "us-east5".
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// URL prefix for API calls, e.g. a proxy. `{location}` and `{project}` are
    /// substituted. Defaults to `https://{location}-aiplatform.googleapis.com/v1`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Static header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Resolve against the process environment.
    pub fn from_env(&self) -> Result<VertexConfig, Error> {
        self.resolve_with(|name| env::var(name).ok())
    }

    /// Resolve using `lookup` for settings that were not given explicitly.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<VertexConfig, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project = load_setting(self.project.as_deref(), "project", PROJECT_ENV, &lookup)?;
        let location = load_setting(self.location.as_deref(), "location", LOCATION_ENV, &lookup)?;

        let mut config = VertexConfig::new(project, location);
        if let Some(base_url) = &self.base_url {
            let base_url = base_url
                .replace("{location}", &config.location)
                .replace("{project}", &config.project_id);
            config = config.with_base_url(base_url);
        }
        config.headers = self.headers.clone();

        tracing::debug!(
            project = %config.project_id,
            location = %config.location,
            base_url = %config.base_url,
            "resolved vertex settings"
        );
        Ok(config)
    }
}

fn load_setting<F>(
    value: Option<&str>,
    name: &str,
    env_name: &str,
    lookup: &F,
) -> Result<String, Error>
where
    F: Fn(&str) -> Option<String>,
{
    value
        .map(str::to_string)
        .or_else(|| lookup(env_name))
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            Error::config(format!(
                "Google Vertex {name} setting is missing. Pass it using the '{name}' parameter or the {env_name} environment variable."
            ))
        })
}

/// Creates [`AnthropicVertexModel`]s sharing one configuration, token supplier and transport.
#[derive(Clone)]
pub struct AnthropicVertexProvider {
    config: Arc<VertexConfig>,
    token_supplier: Arc<dyn TokenSupplier>,
    transport: Arc<dyn Transport>,
}

impl AnthropicVertexProvider {
    /// Create a provider with the default `reqwest` transport.
    pub fn new(
        config: VertexConfig,
        token_supplier: Arc<dyn TokenSupplier>,
    ) -> Result<Self, Error> {
        Ok(Self {
            config: Arc::new(config),
            token_supplier,
            transport: Arc::new(ReqwestTransport::new()?),
        })
    }

    /// Create a provider authenticating with a fixed access token.
    pub fn with_access_token(
        config: VertexConfig,
        access_token: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::new(config, Arc::new(StaticToken::new(access_token)))
    }

    /// Create a provider using Application Default Credentials.
    pub async fn with_adc(config: VertexConfig) -> Result<Self, Error> {
        let supplier = GcpTokenSupplier::from_adc().await?;
        Self::new(config, Arc::new(supplier))
    }

    /// Resolve settings from the environment and authenticate with Application Default Credentials.
    pub async fn from_env() -> Result<Self, Error> {
        let config = ProviderSettings::new().from_env()?;
        Self::with_adc(config).await
    }

    /// Replace the transport, e.g. with a test double or a client with custom middleware.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    pub fn language_model(&self, model_id: impl Into<String>) -> AnthropicVertexModel {
        AnthropicVertexModel::new(
            model_id,
            self.config.clone(),
            self.token_supplier.clone(),
            self.transport.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LanguageModel;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_explicit_settings() {
        let config = ProviderSettings::new()
            .project("test-project")
            .location("us-east5")
            .header("X-Custom", "1")
            .resolve_with(env_of(&[]))
            .unwrap();

        assert_eq!(config.project_id, "test-project");
        assert_eq!(config.location, "us-east5");
        assert_eq!(config.base_url, "https://us-east5-aiplatform.googleapis.com/v1");
        assert_eq!(config.headers.get("X-Custom").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_environment_fallback() {
        let config = ProviderSettings::new()
            .location("europe-west1")
            .resolve_with(env_of(&[
                (PROJECT_ENV, "env-project"),
                (LOCATION_ENV, "us-central1"),
            ]))
            .unwrap();

        assert_eq!(config.project_id, "env-project");
        // Explicit settings win over the environment.
        assert_eq!(config.location, "europe-west1");
    }

    #[test]
    fn test_missing_project() {
        let err = ProviderSettings::new()
            .resolve_with(env_of(&[(LOCATION_ENV, "us-central1")]))
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Google Vertex project setting is missing. Pass it using the 'project' parameter or the GOOGLE_VERTEX_PROJECT environment variable."
        );
    }

    #[test]
    fn test_empty_location_is_missing() {
        let err = ProviderSettings::new()
            .project("p")
            .resolve_with(env_of(&[(LOCATION_ENV, "")]))
            .unwrap_err();
        assert!(err.to_string().contains("'location' parameter"));
    }

    #[test]
    fn test_base_url_placeholders() {
        let config = ProviderSettings::new()
            .project("test-project")
            .location("us-central1")
            .base_url("https://{location}-aiplatform.googleapis.com/v1/")
            .resolve_with(env_of(&[]))
            .unwrap();
        assert_eq!(config.base_url, "https://us-central1-aiplatform.googleapis.com/v1");

        let config = ProviderSettings::new()
            .project("test-project")
            .location("us-central1")
            .base_url("https://proxy.internal/{project}/v1")
            .resolve_with(env_of(&[]))
            .unwrap();
        assert_eq!(config.base_url, "https://proxy.internal/test-project/v1");
    }

    #[test]
    fn test_language_model_shares_config() {
        let provider = AnthropicVertexProvider::with_access_token(
            VertexConfig::new("test-project", "us-east5"),
            "test-token",
        )
        .unwrap();

        let sonnet = provider.language_model("claude-3-5-sonnet-v2@20241022");
        let haiku = provider.language_model("claude-3-haiku@20240307");

        assert_eq!(sonnet.provider(), "anthropic.vertex");
        assert_eq!(sonnet.model_id(), "claude-3-5-sonnet-v2@20241022");
        assert_eq!(haiku.model_id(), "claude-3-haiku@20240307");
        assert_eq!(haiku.config(), provider.config());
    }
}
