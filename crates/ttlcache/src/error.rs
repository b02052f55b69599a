use std::sync::Arc;
use thiserror::Error;

/// The ways in which `Cache::get` can fail to produce a lookup.
///
/// Errors that the update function chose to cache are not represented
/// here; they are returned inside `Lookup::result` just like a value.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The update function could not complete the fill.
    /// This outcome is never cached; the next `get` will retry.
    /// Every caller that waited on the failed fill receives the same
    /// underlying error.
    #[error("{0:#}")]
    Update(Arc<anyhow::Error>),
    /// The caller's context was cancelled while waiting for another
    /// caller to populate the entry.
    #[error("context cancelled")]
    Cancelled,
    /// The caller's context deadline elapsed while waiting for another
    /// caller to populate the entry.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// The caller that was populating the entry went away (its future
    /// was dropped, or the update function panicked) before it produced
    /// any outcome.
    #[error("fill abandoned before producing a result")]
    Abandoned,
}

impl CacheError {
    /// Returns true if this error was produced by the caller's own
    /// context rather than by the fill.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns the update function's error, if that is what this is
    pub fn update_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Update(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache {name}: ttl must be a positive duration")]
    ZeroTtl { name: String },
}
