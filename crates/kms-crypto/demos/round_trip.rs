//! Encrypt and decrypt one value against a real key management endpoint.
//!
//! ```text
//! KMS_PROJECT=my-project KMS_KEY_RING=my-ring KMS_KEY=my-key \
//!     cargo run -p kms-crypto --example round_trip -- "text to protect"
//! ```
//!
//! Startup sequence:
//! 1. Load and validate [`KmsConfig`] from environment variables.
//! 2. Initialise structured JSON logging.
//! 3. Connect to the configured backend with ambient credentials.
//! 4. Round-trip the first argument through encrypt and decrypt.

use std::time::Duration;

use anyhow::{Context, Result};
use kms_crypto::{build_key_name, telemetry, CallContext, KeyCryptoService, KmsConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = KmsConfig::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Service
    // -----------------------------------------------------------------------
    let service = KeyCryptoService::connect(&cfg)
        .await
        .context("failed to connect to key management service")?;

    let key = build_key_name(
        &std::env::var("KMS_PROJECT").context("KMS_PROJECT is required")?,
        &std::env::var("KMS_KEY_RING").context("KMS_KEY_RING is required")?,
        &std::env::var("KMS_KEY").context("KMS_KEY is required")?,
    );

    // -----------------------------------------------------------------------
    // 4. Round trip
    // -----------------------------------------------------------------------
    let plaintext = std::env::args().nth(1).unwrap_or_else(|| "hello".into());
    let ctx = CallContext::new().with_timeout(Duration::from_secs(10));

    let sealed = service.encrypt(&ctx, &key, plaintext.as_bytes()).await?;
    info!(key = %key, ciphertext_len = sealed.len(), "encrypted");

    let opened = service.decrypt(&ctx, &key, &sealed).await?;
    anyhow::ensure!(opened == plaintext, "round trip returned different plaintext");
    info!(key = %key, "round trip ok");

    println!("{sealed}");
    Ok(())
}
