use crate::error::{LoanError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Per-request scope handed to every engine operation.
///
/// Carries the caller's deadline. When the deadline passes the operation is
/// dropped at its next suspension point and reported as
/// [`LoanError::DeadlineExceeded`]; storage writes are single atomic units,
/// so a dropped operation never leaves partial state behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context without a deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `operation`, bounded by the deadline if there is one.
    pub async fn run<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, operation)
                .await
                .map_err(|_| LoanError::DeadlineExceeded)?,
            None => operation.await,
        }
    }
}
