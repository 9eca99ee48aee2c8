//! [`KeyCryptoService`]: encrypt and decrypt through the managed key service.
//!
//! Each call is one independent request to the remote endpoint. The only
//! local transformation is base64 (standard alphabet, padded) around the
//! ciphertext bytes; all cryptography happens remotely.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{CryptoError, Operation, RemoteError};
use tracing::{debug, instrument, warn};

use crate::client::{self, KeyManagementClient};
use crate::config::KmsConfig;
use crate::context::CallContext;

/// Text-oriented encrypt/decrypt capability.
///
/// Lets consumers depend on the operations rather than on
/// [`KeyCryptoService`] itself.
#[async_trait]
pub trait Crypto: Send + Sync {
    async fn encrypt(&self, ctx: &CallContext, key: &str, plaintext: &[u8]) -> Result<String, CryptoError>;

    async fn decrypt(&self, ctx: &CallContext, key: &str, ciphertext: &str) -> Result<String, CryptoError>;
}

/// Envelope encryption service holding one shared client handle.
///
/// Cloning is cheap and every clone shares the same handle, so a single
/// instance can serve any number of concurrent callers.
#[derive(Clone)]
pub struct KeyCryptoService {
    client: Arc<dyn KeyManagementClient>,
}

impl fmt::Debug for KeyCryptoService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCryptoService").finish_non_exhaustive()
    }
}

impl KeyCryptoService {
    /// Connect to the backend named in `cfg` using ambient credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Connection`] if the client cannot be created.
    /// No retries are attempted.
    pub async fn connect(cfg: &KmsConfig) -> Result<Self, CryptoError> {
        Ok(Self::with_client(client::connect(cfg).await?))
    }

    /// Load [`KmsConfig`] from the environment, then [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Connection`] if the configuration is invalid or
    /// the client cannot be created.
    pub async fn from_env() -> Result<Self, CryptoError> {
        let cfg = KmsConfig::from_env()
            .map_err(|e| CryptoError::Connection(RemoteError::Configuration(format!("{e:#}"))))?;
        Self::connect(&cfg).await
    }

    /// Build a service around an existing client.
    pub fn with_client(client: Arc<dyn KeyManagementClient>) -> Self {
        Self { client }
    }

    /// Encrypt `plaintext` under `key` and return the ciphertext as base64.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RemoteService`] if the remote call fails, is
    /// cancelled, or times out.
    #[instrument(skip_all, fields(key = %key, plaintext_len = plaintext.len()))]
    pub async fn encrypt(&self, ctx: &CallContext, key: &str, plaintext: &[u8]) -> Result<String, CryptoError> {
        let ciphertext = ctx
            .run(self.client.encrypt(key, plaintext))
            .await
            .map_err(|source| remote_failure(Operation::Encrypt, source))?;

        debug!(ciphertext_len = ciphertext.len(), "encrypted");
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt a base64 ciphertext under `key` and return the plaintext bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encoding`] without contacting the endpoint if
    /// `ciphertext` is not valid base64, or [`CryptoError::RemoteService`] if
    /// the remote call fails, is cancelled, or times out.
    #[instrument(skip_all, fields(key = %key, ciphertext_len = ciphertext.len()))]
    pub async fn decrypt_bytes(&self, ctx: &CallContext, key: &str, ciphertext: &str) -> Result<Vec<u8>, CryptoError> {
        let raw = STANDARD.decode(ciphertext)?;

        let plaintext = ctx
            .run(self.client.decrypt(key, &raw))
            .await
            .map_err(|source| remote_failure(Operation::Decrypt, source))?;

        debug!(plaintext_len = plaintext.len(), "decrypted");
        Ok(plaintext)
    }

    /// Decrypt a base64 ciphertext under `key` and return the plaintext as text.
    ///
    /// The caller is responsible for knowing the original plaintext was text.
    ///
    /// # Errors
    ///
    /// As [`decrypt_bytes`](Self::decrypt_bytes), plus
    /// [`CryptoError::InvalidUtf8`] if the plaintext is not UTF-8.
    pub async fn decrypt(&self, ctx: &CallContext, key: &str, ciphertext: &str) -> Result<String, CryptoError> {
        let plaintext = self.decrypt_bytes(ctx, key, ciphertext).await?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}

fn remote_failure(operation: Operation, source: RemoteError) -> CryptoError {
    warn!(%operation, error = %source, "kms call failed");
    CryptoError::RemoteService { operation, source }
}

#[async_trait]
impl Crypto for KeyCryptoService {
    async fn encrypt(&self, ctx: &CallContext, key: &str, plaintext: &[u8]) -> Result<String, CryptoError> {
        KeyCryptoService::encrypt(self, ctx, key, plaintext).await
    }

    async fn decrypt(&self, ctx: &CallContext, key: &str, ciphertext: &str) -> Result<String, CryptoError> {
        KeyCryptoService::decrypt(self, ctx, key, ciphertext).await
    }
}
