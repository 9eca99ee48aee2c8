//! Remote key management clients.
//!
//! [`KeyManagementClient`] is the only capability the service needs from the
//! remote endpoint: encrypt bytes under a named key and decrypt them again.
//! Production backends live in the submodules; tests substitute a fake.
//!
//! Implementations must be safe to share across tasks. Both backends wrap a
//! connection-pooled HTTP client and hold no per-call state.

pub mod aws;
pub mod credentials;
pub mod gcp;

use std::sync::Arc;

use async_trait::async_trait;
use common::{CryptoError, RemoteError};
use tracing::info;

use crate::config::{KmsConfig, Provider};

pub use aws::AwsKmsClient;
pub use gcp::CloudKmsClient;

/// The two-operation contract offered by a managed key service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyManagementClient: Send + Sync {
    /// Encrypt `plaintext` under the key named `key_name`, returning the raw
    /// ciphertext bytes.
    async fn encrypt(&self, key_name: &str, plaintext: &[u8]) -> Result<Vec<u8>, RemoteError>;

    /// Decrypt raw `ciphertext` bytes under the key named `key_name`.
    async fn decrypt(&self, key_name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, RemoteError>;
}

/// Create the client selected by `cfg.kms_provider`.
///
/// # Errors
///
/// Returns [`CryptoError::Connection`] if the endpoint is malformed, the HTTP
/// stack cannot be built, or no credentials can be discovered.
pub async fn connect(cfg: &KmsConfig) -> Result<Arc<dyn KeyManagementClient>, CryptoError> {
    let client: Arc<dyn KeyManagementClient> = match cfg.kms_provider {
        Provider::Gcp => Arc::new(CloudKmsClient::connect(cfg).await?),
        Provider::Aws => Arc::new(AwsKmsClient::connect(cfg).await?),
    };
    info!(provider = ?cfg.kms_provider, "key management client ready");
    Ok(client)
}
