//! Envelope encryption through a managed key management service.
//!
//! [`KeyCryptoService`] forwards encrypt and decrypt requests to a remote
//! key service and carries ciphertext as standard base64 text. Key
//! material never leaves the remote service.
//!
//! ```no_run
//! # async fn demo() -> Result<(), kms_crypto::CryptoError> {
//! use kms_crypto::{build_key_name, CallContext, KeyCryptoService};
//!
//! let service = KeyCryptoService::from_env().await?;
//! let key = build_key_name("my-project", "my-ring", "my-key");
//! let ctx = CallContext::new();
//!
//! let sealed = service.encrypt(&ctx, &key, b"123-45-6789").await?;
//! let opened = service.decrypt(&ctx, &key, &sealed).await?;
//! assert_eq!(opened, "123-45-6789");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod service;
pub mod telemetry;

pub use client::KeyManagementClient;
pub use common::{build_key_name, CryptoError, KeyReference, Operation, RemoteError};
pub use config::{KmsConfig, Provider};
pub use context::CallContext;
pub use service::{Crypto, KeyCryptoService};
