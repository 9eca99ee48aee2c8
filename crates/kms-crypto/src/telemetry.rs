//! Logging for hosts that embed the key crypto service.
//!
//! What the crate records:
//! - `encrypt` / `decrypt_bytes` spans carrying the key resource name and
//!   the input length;
//! - a `debug` event with the output length when a call succeeds;
//! - a `warn` event `kms call failed` with the operation and remote reason;
//! - an `info` event when the backend client is ready, naming the provider.
//!
//! Events are written as one JSON object per line on stdout, with the fields
//! of the enclosing call span flattened into `span`. Plaintext, ciphertext and
//! bearer tokens are never recorded. `RUST_LOG` overrides the configured level.

use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the JSON subscriber as the global default.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing::subscriber::set_global_default(subscriber(filter, std::io::stdout))
        .map_err(|e| anyhow::anyhow!("failed to initialise kms tracing subscriber: {e}"))
}

fn subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_env_filter(filter)
        .with_writer(writer)
        .finish()
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use common::RemoteError;

    use super::*;
    use crate::client::MockKeyManagementClient;
    use crate::{CallContext, KeyCryptoService};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'w> MakeWriter<'w> for Captured {
        type Writer = Captured;

        fn make_writer(&'w self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn failed_call_logs_key_and_reason_but_not_plaintext() {
        let captured = Captured::default();
        let sub = subscriber(EnvFilter::new("warn"), captured.clone());

        let mut mock = MockKeyManagementClient::new();
        mock.expect_encrypt().returning(|_, _| {
            Err(RemoteError::Status {
                code: 403,
                status: "PERMISSION_DENIED".into(),
                message: "Permission denied on resource.".into(),
            })
        });
        let svc = KeyCryptoService::with_client(Arc::new(mock));

        tracing::subscriber::with_default(sub, || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(svc.encrypt(&CallContext::new(), "projects/p/keys/k", b"card-4111"))
                .unwrap_err();
        });

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["fields"]["message"], "kms call failed");
        assert_eq!(line["fields"]["operation"], "encrypt");
        assert_eq!(line["span"]["key"], "projects/p/keys/k");
        assert_eq!(line["span"]["plaintext_len"], 9);
        assert!(!out.contains("card-4111"));
    }

    #[test]
    fn second_init_is_rejected() {
        // Another test may have installed a subscriber first; either way the
        // second attempt in this process must fail.
        let _ = init("debug");
        assert!(init("debug").is_err());
    }
}
