//! Error types shared across crates.
//!
//! Every variant is safe to log: none of them carries plaintext or
//! ciphertext, only the operation that failed and the reason reported by
//! the transport or the remote endpoint.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Boxed error used for transport-level failure sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The remote operation a [`CryptoError::RemoteService`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Encrypt => f.write_str("encrypt"),
            Operation::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Why a call to the key management endpoint failed.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The caller cancelled the call before the endpoint answered.
    #[error("request cancelled")]
    Cancelled,

    /// The caller-supplied timeout elapsed before the endpoint answered.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The endpoint answered with an error status.
    #[error("{code} {status}: {message}")]
    Status {
        /// Numeric status (HTTP status for both backends).
        code: u16,
        /// Symbolic status, e.g. `NOT_FOUND` or `NotFoundException`.
        status: String,
        /// Message reported by the endpoint.
        message: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("transport failure")]
    Transport(#[source] BoxError),

    /// The endpoint answered 2xx but the body could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The client settings cannot be used (bad endpoint URL, unparsable
    /// environment).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No usable credentials could be discovered from the environment.
    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

impl RemoteError {
    /// Wrap any transport error.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        RemoteError::Transport(err.into())
    }
}

/// Top-level error returned by the crypto service.
///
/// Callers branch on the variant:
/// - [`CryptoError::Connection`]: the client could not be created; retry
///   construction or abort.
/// - [`CryptoError::Encoding`]: the ciphertext was not valid base64; no
///   remote call was made.
/// - [`CryptoError::RemoteService`]: the endpoint (or the transport to it)
///   failed the call.
/// - [`CryptoError::InvalidUtf8`]: decryption succeeded but the plaintext is
///   not text.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("kms: failed to create key management client")]
    Connection(#[source] RemoteError),

    #[error("kms: failed base64 decode")]
    Encoding(#[from] base64::DecodeError),

    #[error("kms: failed to {operation}")]
    RemoteService {
        operation: Operation,
        #[source]
        source: RemoteError,
    },

    #[error("kms: decrypted plaintext is not valid UTF-8")]
    InvalidUtf8,
}

impl CryptoError {
    /// The remote operation that failed, if this is a remote failure.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            CryptoError::RemoteService { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Returns `true` if the call was abandoned because of caller
    /// cancellation or an elapsed timeout.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CryptoError::RemoteService {
                source: RemoteError::Cancelled | RemoteError::DeadlineExceeded(_),
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn remote_service_display_names_operation() {
        let e = CryptoError::RemoteService {
            operation: Operation::Encrypt,
            source: RemoteError::Status {
                code: 404,
                status: "NOT_FOUND".into(),
                message: "CryptoKey not found".into(),
            },
        };
        assert_eq!(e.to_string(), "kms: failed to encrypt");
        assert_eq!(e.operation(), Some(Operation::Encrypt));
        let source = e.source().expect("remote failure keeps its cause");
        assert!(source.to_string().contains("NOT_FOUND"));
    }

    #[test]
    fn cancellation_is_detected() {
        let cancelled = CryptoError::RemoteService {
            operation: Operation::Decrypt,
            source: RemoteError::Cancelled,
        };
        let timed_out = CryptoError::RemoteService {
            operation: Operation::Decrypt,
            source: RemoteError::DeadlineExceeded(Duration::from_millis(5)),
        };
        assert!(cancelled.is_cancelled());
        assert!(timed_out.is_cancelled());
        assert!(!CryptoError::InvalidUtf8.is_cancelled());
    }

    #[test]
    fn encoding_error_has_no_operation() {
        use base64::Engine as _;
        let err = base64::engine::general_purpose::STANDARD
            .decode("not-valid-base64!!")
            .unwrap_err();
        let e = CryptoError::from(err);
        assert_eq!(e.to_string(), "kms: failed base64 decode");
        assert_eq!(e.operation(), None);
    }

    #[test]
    fn transport_wraps_string_sources() {
        let e = RemoteError::transport("connection reset by peer");
        assert_eq!(e.to_string(), "transport failure");
        assert_eq!(
            e.source().map(|s| s.to_string()).as_deref(),
            Some("connection reset by peer")
        );
    }
}
