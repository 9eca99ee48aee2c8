//! Ambient OAuth2 bearer tokens for Cloud KMS.
//!
//! Discovery order:
//! 1. `GOOGLE_OAUTH_ACCESS_TOKEN`, used verbatim and never refreshed.
//! 2. Application Default Credentials through [`gcp_auth`]: the
//!    `GOOGLE_APPLICATION_CREDENTIALS` service-account file, the GCE/GKE
//!    metadata server, then gcloud user credentials. `gcp_auth` caches and
//!    refreshes these tokens itself.

use std::fmt;
use std::sync::Arc;

use common::RemoteError;
use gcp_auth::TokenProvider;

use crate::config::KmsConfig;

/// OAuth2 scope required by the Cloud KMS encrypt and decrypt methods.
pub const CLOUD_KMS_SCOPE: &str = "https://www.googleapis.com/auth/cloudkms";

/// Where bearer tokens come from.
#[derive(Clone)]
pub enum TokenSource {
    Static(Arc<str>),
    ApplicationDefault(Arc<dyn TokenProvider>),
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static([REDACTED])"),
            TokenSource::ApplicationDefault(_) => f.write_str("TokenSource::ApplicationDefault"),
        }
    }
}

impl TokenSource {
    /// Pick a source from the environment-derived configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Credentials`] if no static token is configured
    /// and Application Default Credentials cannot be discovered.
    pub async fn from_config(cfg: &KmsConfig) -> Result<Self, RemoteError> {
        if let Some(token) = &cfg.google_oauth_access_token {
            return Ok(TokenSource::Static(Arc::from(token.as_str())));
        }
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| RemoteError::Credentials(format!("application default credentials: {e}")))?;
        Ok(TokenSource::ApplicationDefault(provider))
    }

    /// Return a valid bearer token for the Cloud KMS scope.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Credentials`] if the provider cannot mint a token.
    pub async fn bearer(&self) -> Result<String, RemoteError> {
        match self {
            TokenSource::Static(token) => Ok(token.to_string()),
            TokenSource::ApplicationDefault(provider) => provider
                .token(&[CLOUD_KMS_SCOPE])
                .await
                .map(|token| token.as_str().to_owned())
                .map_err(|e| RemoteError::Credentials(format!("token request failed: {e}"))),
        }
    }
}
