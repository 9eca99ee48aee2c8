//! Google Cloud KMS backend over the v1 REST API.
//!
//! ```text
//! POST {endpoint}/v1/{key_name}:encrypt  {"plaintext":  "<base64>"} -> {"ciphertext": "<base64>"}
//! POST {endpoint}/v1/{key_name}:decrypt  {"ciphertext": "<base64>"} -> {"plaintext":  "<base64>"}
//! ```
//!
//! Payload bytes travel base64-encoded inside JSON; this module converts
//! them to and from raw bytes so callers only ever see bytes.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{CryptoError, RemoteError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::credentials::TokenSource;
use super::KeyManagementClient;
use crate::config::KmsConfig;

/// Public Cloud KMS endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://cloudkms.googleapis.com";

#[derive(Serialize)]
struct EncryptRequest {
    plaintext: String,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: Option<String>,
}

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

// The API omits `plaintext` entirely when it is empty.
#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(default)]
    plaintext: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Cloud KMS client sharing one pooled HTTP connection across all calls.
#[derive(Clone, Debug)]
pub struct CloudKmsClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: TokenSource,
}

impl CloudKmsClient {
    /// Build the HTTP stack and resolve credentials once.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Connection`] if the endpoint is not a valid URL,
    /// the HTTP client cannot be built, or no token can be obtained.
    pub async fn connect(cfg: &KmsConfig) -> Result<Self, CryptoError> {
        let endpoint = cfg
            .kms_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_owned();
        reqwest::Url::parse(&endpoint).map_err(|e| {
            CryptoError::Connection(RemoteError::Configuration(format!(
                "KMS_ENDPOINT is not a valid URL: {e}"
            )))
        })?;

        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| CryptoError::Connection(RemoteError::transport(e)))?;

        let tokens = TokenSource::from_config(cfg)
            .await
            .map_err(CryptoError::Connection)?;
        tokens.bearer().await.map_err(CryptoError::Connection)?;

        Ok(Self {
            http,
            endpoint,
            tokens,
        })
    }

    async fn call<Req, Resp>(&self, key_name: &str, method: &str, body: &Req) -> Result<Resp, RemoteError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let token = self.tokens.bearer().await?;
        let url = format!("{}/v1/{key_name}:{method}", self.endpoint);

        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(RemoteError::transport)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(RemoteError::transport)?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }

        // serde errors can quote the offending value; keep them out of the message.
        serde_json::from_slice(&bytes).map_err(|e| {
            RemoteError::MalformedResponse(format!("{method} response body ({:?})", e.classify()))
        })
    }
}

fn status_error(status: reqwest::StatusCode, body: &[u8]) -> RemoteError {
    let (symbol, message) = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.status, envelope.error.message),
        Err(_) => (String::new(), String::new()),
    };
    let reason = status.canonical_reason().unwrap_or("unknown status");
    RemoteError::Status {
        code: status.as_u16(),
        status: if symbol.is_empty() { reason.to_owned() } else { symbol },
        message: if message.is_empty() { reason.to_owned() } else { message },
    }
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>, RemoteError> {
    STANDARD
        .decode(value)
        .map_err(|_| RemoteError::MalformedResponse(format!("{field} is not valid base64")))
}

#[async_trait]
impl KeyManagementClient for CloudKmsClient {
    async fn encrypt(&self, key_name: &str, plaintext: &[u8]) -> Result<Vec<u8>, RemoteError> {
        let req = EncryptRequest {
            plaintext: STANDARD.encode(plaintext),
        };
        let resp: EncryptResponse = self.call(key_name, "encrypt", &req).await?;
        let ciphertext = resp
            .ciphertext
            .filter(|c| !c.is_empty())
            .ok_or_else(|| RemoteError::MalformedResponse("encrypt response carried no ciphertext".into()))?;
        decode_field(&ciphertext, "ciphertext")
    }

    async fn decrypt(&self, key_name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, RemoteError> {
        let req = DecryptRequest {
            ciphertext: STANDARD.encode(ciphertext),
        };
        let resp: DecryptResponse = self.call(key_name, "decrypt", &req).await?;
        decode_field(&resp.plaintext, "plaintext")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const KEY: &str = "projects/p/locations/global/keyRings/r/cryptoKeys/k";

    async fn client_for(server: &MockServer) -> CloudKmsClient {
        let cfg = KmsConfig {
            kms_endpoint: Some(server.uri()),
            google_oauth_access_token: Some("test-token".into()),
            ..KmsConfig::default()
        };
        CloudKmsClient::connect(&cfg).await.unwrap()
    }

    #[tokio::test]
    async fn encrypt_sends_base64_plaintext_and_decodes_ciphertext() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{KEY}:encrypt")))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(json!({"plaintext": STANDARD.encode(b"hello")})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": KEY,
                "ciphertext": STANDARD.encode(b"sealed-bytes")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let out = client.encrypt(KEY, b"hello").await.unwrap();
        assert_eq!(out, b"sealed-bytes");
    }

    #[tokio::test]
    async fn decrypt_treats_missing_plaintext_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{KEY}:decrypt")))
            .and(body_json(json!({"ciphertext": STANDARD.encode(b"sealed")})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let out = client.decrypt(KEY, b"sealed").await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn error_envelope_becomes_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{KEY}:encrypt")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": 404,
                    "message": "CryptoKey not found.",
                    "status": "NOT_FOUND"
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client.encrypt(KEY, b"hello").await.unwrap_err() {
            RemoteError::Status {
                code,
                status,
                message,
            } => {
                assert_eq!(code, 404);
                assert_eq!(status, "NOT_FOUND");
                assert_eq!(message, "CryptoKey not found.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_falls_back_to_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream connect error"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.decrypt(KEY, b"sealed").await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Status { code: 503, ref status, .. } if status == "Service Unavailable"
        ));
    }

    #[tokio::test]
    async fn missing_ciphertext_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": KEY})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.encrypt(KEY, b"hello").await.unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn malformed_endpoint_fails_to_connect() {
        let cfg = KmsConfig {
            kms_endpoint: Some("not a url".into()),
            google_oauth_access_token: Some("test-token".into()),
            ..KmsConfig::default()
        };
        let err = CloudKmsClient::connect(&cfg).await.unwrap_err();
        assert!(matches!(
            err,
            CryptoError::Connection(RemoteError::Configuration(_))
        ));
    }
}
