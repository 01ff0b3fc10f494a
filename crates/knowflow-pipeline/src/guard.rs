//! Per-call timeout and cooperative cancellation

use knowflow_core::{KnowflowError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounds every model and store call made on behalf of one request
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallGuard {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with [`KnowflowError::Cancelled`] if the request has been abandoned
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(KnowflowError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Race `call` against the timeout and the cancellation token
    ///
    /// Cancellation wins when both are ready. A timeout is reported as
    /// [`KnowflowError::Timeout`] tagged with `service`.
    pub async fn run<F, T>(&self, service: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(KnowflowError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(KnowflowError::Timeout {
                    service: service.to_string(),
                    after: self.timeout,
                }),
            },
        }
    }

    /// [`CallGuard::run`] for calls that degrade internally instead of failing
    pub async fn run_infallible<F, T>(&self, service: &str, call: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        self.run(service, async move { Ok::<T, KnowflowError>(call.await) })
            .await
    }
}
