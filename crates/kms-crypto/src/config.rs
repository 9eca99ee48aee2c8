//! Configuration loading and validation for the key management client.
//!
//! All values are read from environment variables. Nothing is required:
//! credentials are discovered ambiently by the selected backend, and every
//! setting below has a default.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Which managed key service backs the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Cloud KMS over its REST API.
    #[default]
    Gcp,
    /// AWS KMS through the AWS SDK.
    Aws,
}

/// Validated client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KmsConfig {
    /// Backend selection (`gcp` or `aws`).
    #[serde(default)]
    pub kms_provider: Provider,

    /// Endpoint override, e.g. a private service connect address or a local
    /// emulator. When unset the provider's public endpoint is used.
    #[serde(default)]
    pub kms_endpoint: Option<String>,

    /// Transport-level timeout (seconds) applied to every remote call.
    #[serde(default = "default_request_timeout")]
    pub kms_request_timeout_secs: u64,

    /// Static OAuth2 bearer token for Cloud KMS. When unset, Application
    /// Default Credentials are discovered (service-account file, metadata
    /// server, gcloud user credentials).
    #[serde(default)]
    pub google_oauth_access_token: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            kms_provider: Provider::default(),
            kms_endpoint: None,
            kms_request_timeout_secs: default_request_timeout(),
            google_oauth_access_token: None,
            log_level: default_log_level(),
        }
    }
}

impl KmsConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: KmsConfig = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Transport-level timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.kms_request_timeout_secs)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<()> {
        if self.kms_request_timeout_secs == 0 {
            anyhow::bail!("KMS_REQUEST_TIMEOUT_SECS must be > 0");
        }
        if let Some(endpoint) = &self.kms_endpoint {
            ensure_non_empty(endpoint, "KMS_ENDPOINT")?;
        }
        if let Some(token) = &self.google_oauth_access_token {
            ensure_non_empty(token, "GOOGLE_OAUTH_ACCESS_TOKEN")?;
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty when set");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let cfg = KmsConfig::default();
        assert_eq!(cfg.kms_provider, Provider::Gcp);
        assert_eq!(cfg.kms_endpoint, None);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let cfg = KmsConfig {
            kms_request_timeout_secs: 0,
            ..KmsConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_endpoint() {
        let cfg = KmsConfig {
            kms_endpoint: Some("  ".into()),
            ..KmsConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_token() {
        let cfg = KmsConfig {
            google_oauth_access_token: Some(String::new()),
            ..KmsConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn provider_deserialises_lowercase() {
        let cfg = config::Config::builder()
            .set_override("kms_provider", "aws")
            .unwrap()
            .build()
            .unwrap();
        let c: KmsConfig = cfg.try_deserialize().unwrap();
        assert_eq!(c.kms_provider, Provider::Aws);
        assert_eq!(c.kms_request_timeout_secs, 30);
    }
}
