//! AWS KMS backend built on the AWS SDK.
//!
//! The key name is passed to KMS as `KeyId`, so it must be a key ID, key
//! ARN, alias name or alias ARN. Credentials come from the standard AWS
//! provider chain (environment, profile, IMDS, ECS/EKS).

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use common::{CryptoError, RemoteError};

use super::KeyManagementClient;
use crate::config::KmsConfig;

/// AWS KMS client; the SDK client is internally reference-counted.
#[derive(Clone, Debug)]
pub struct AwsKmsClient {
    kms: aws_sdk_kms::Client,
}

impl AwsKmsClient {
    /// Load the shared SDK config and build the KMS client.
    ///
    /// # Errors
    ///
    /// See [`connect_with`](Self::connect_with).
    pub async fn connect(cfg: &KmsConfig) -> Result<Self, CryptoError> {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::connect_with(&shared, cfg).await
    }

    /// Build the KMS client from an already loaded SDK config, resolving
    /// credentials once so that a missing identity fails here rather than on
    /// the first call.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Connection`] if no region is configured or the
    /// credentials provider chain yields no credentials.
    pub async fn connect_with(shared: &SdkConfig, cfg: &KmsConfig) -> Result<Self, CryptoError> {
        if shared.region().is_none() {
            return Err(CryptoError::Connection(RemoteError::Configuration(
                "no AWS region configured".into(),
            )));
        }

        let provider = shared.credentials_provider().ok_or_else(|| {
            CryptoError::Connection(RemoteError::Credentials(
                "no AWS credentials provider configured".into(),
            ))
        })?;
        provider.provide_credentials().await.map_err(|e| {
            CryptoError::Connection(RemoteError::Credentials(
                DisplayErrorContext(&e).to_string(),
            ))
        })?;

        let mut builder = aws_sdk_kms::config::Builder::from(shared).timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(cfg.request_timeout())
                .build(),
        );
        if let Some(endpoint) = &cfg.kms_endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self::from_client(aws_sdk_kms::Client::from_conf(builder.build())))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(kms: aws_sdk_kms::Client) -> Self {
        Self { kms }
    }
}

fn map_sdk_error<E>(err: SdkError<E, HttpResponse>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match &err {
        SdkError::ServiceError(service) => RemoteError::Status {
            code: service.raw().status().as_u16(),
            status: service.err().code().unwrap_or("Unknown").to_owned(),
            message: service.err().message().unwrap_or_default().to_owned(),
        },
        _ => RemoteError::transport(DisplayErrorContext(&err).to_string()),
    }
}

#[async_trait]
impl KeyManagementClient for AwsKmsClient {
    async fn encrypt(&self, key_name: &str, plaintext: &[u8]) -> Result<Vec<u8>, RemoteError> {
        let resp = self
            .kms
            .encrypt()
            .key_id(key_name)
            .plaintext(Blob::new(plaintext))
            .send()
            .await
            .map_err(map_sdk_error)?;

        resp.ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| RemoteError::MalformedResponse("encrypt response carried no ciphertext".into()))
    }

    async fn decrypt(&self, key_name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, RemoteError> {
        let resp = self
            .kms
            .decrypt()
            .key_id(key_name)
            .ciphertext_blob(Blob::new(ciphertext))
            .send()
            .await
            .map_err(map_sdk_error)?;

        resp.plaintext()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| RemoteError::MalformedResponse("decrypt response carried no plaintext".into()))
    }
}
