//! Per-call cancellation and timeout.

use std::future::Future;
use std::time::Duration;

use common::RemoteError;
use tokio_util::sync::CancellationToken;

/// Caller-supplied execution context for one remote call.
///
/// The call is abandoned as soon as the token is cancelled or the timeout
/// elapses, whichever comes first. A default context never cancels on its
/// own; the transport-level timeout from [`crate::KmsConfig`] still applies.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancellation: CancellationToken,
    timeout: Option<Duration>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abandon the call once `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abandon the call when `token` (or any of its parents) is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Drive `call` to completion unless the context gives up first.
    pub(crate) async fn run<T, F>(&self, call: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or(Err(RemoteError::DeadlineExceeded(limit))),
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(RemoteError::Cancelled),
            result = bounded => result,
        }
    }
}
