//! A per-call cancellation capability.
//!
//! Every `Cache::get` takes a `Context`.  The cache only looks at it
//! while the caller is blocked waiting for some other caller to populate
//! an entry; the leader of a fill passes it through to the update function
//! untouched, and it is up to that function whether it honors it.
use crate::CacheError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Returns `now + duration`, saturating at a point far enough in the
/// future that it will never be reached.
pub(crate) fn instant_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline,
    /// unless `cancel` is called on it.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that is cancelled when either it, or `self`,
    /// is cancelled.  Cancelling the child does not affect the parent.
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child context that additionally expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(instant_after(timeout))
    }

    /// Derive a child context that additionally expires at `deadline`.
    /// If the parent has an earlier deadline, that one is retained.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Returns the reason that this context has ended, or None if it
    /// is still live
    pub fn err(&self) -> Option<CacheError> {
        if self.token.is_cancelled() {
            return Some(CacheError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CacheError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once this context is cancelled or its deadline passes,
    /// yielding the corresponding error
    pub async fn done(&self) -> CacheError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => CacheError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => CacheError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CacheError::Cancelled
            }
        }
    }
}
