//! Bearer token suppliers.

use gcp_auth::TokenProvider;
use std::sync::Arc;

use crate::Error;

/// OAuth scope requested for Vertex AI calls.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Supplies a bearer token for each outbound call.
///
/// The adapter calls this exactly once per request and never caches the result;
/// refresh and expiry are the supplier's concern.
#[async_trait::async_trait]
pub trait TokenSupplier: Send + Sync {
    async fn bearer_token(&self) -> Result<String, Error>;
}

/// A fixed access token, e.g. from `gcloud auth print-access-token`.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSupplier for StaticToken {
    async fn bearer_token(&self) -> Result<String, Error> {
        if self.0.is_empty() {
            return Err(Error::auth("Static access token is empty"));
        }
        Ok(self.0.clone())
    }
}

/// Tokens from Google Application Default Credentials.
pub struct GcpTokenSupplier {
    provider: Arc<dyn TokenProvider>,
}

impl GcpTokenSupplier {
    /// Discover Application Default Credentials from the environment.
    pub async fn from_adc() -> Result<Self, Error> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| Error::auth(format!("Failed to create auth manager: {e}")))?;
        Ok(Self { provider })
    }

    /// Wrap an already-configured `gcp_auth` provider.
    pub fn with_provider(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl TokenSupplier for GcpTokenSupplier {
    async fn bearer_token(&self) -> Result<String, Error> {
        let token = self
            .provider
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| Error::auth(format!("Failed to get ADC token: {e}")))?;
        Ok(token.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let supplier = StaticToken::new("test-access-token");
        assert_eq!(supplier.bearer_token().await.unwrap(), "test-access-token");
    }

    #[tokio::test]
    async fn test_empty_static_token_is_unavailable() {
        let supplier = StaticToken::new("");
        let err = supplier.bearer_token().await.unwrap_err();
        assert!(matches!(err, Error::AuthUnavailable(_)));
    }
}
