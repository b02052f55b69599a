//! An in-memory cache for expensive, idempotent lookups that guarantees
//! at most one concurrent recomputation per key.
//!
//! When many callers `get` the same missing or expired key at the same
//! time, exactly one of them runs the `UpdateFunction`; the others wait
//! and receive its outcome, whether that is a value, a cached error, or
//! a transient failure.
//!
//! Entries are checked for expiry lazily on access and are never evicted,
//! so the number of entries grows with the number of distinct keys that
//! have been requested.
use crate::fill::{run_fill, wait_for_fill};
use crate::metrics::CacheMetrics;
use crate::store::{Claim, EntryStore};
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

mod config;
mod context;
mod error;
mod fill;
mod metrics;
mod store;
mod update;

pub use config::CacheParams;
pub use context::Context;
pub use error::{CacheError, ConfigError};
pub use store::{EntrySnapshot, Item};
pub use update::UpdateFunction;

/// The outcome of a successful `Cache::get`
#[derive(Debug, Clone)]
pub struct Lookup<V, E> {
    /// The installed result.  An `Err` here is an error that the update
    /// function chose to cache; it is replayed until `expiration`.
    pub result: Result<V, E>,
    /// false if the update function ran on behalf of this call,
    /// true if the result was already present, or was produced by a
    /// fill that another caller was running.
    pub hit: bool,
    /// The time at which `result` stops being fresh
    pub expiration: Instant,
}

impl<V, E> Lookup<V, E> {
    fn from_item(item: Item<V, E>, hit: bool) -> Self {
        Self {
            result: item.result,
            hit,
            expiration: item.expiration,
        }
    }

    pub fn into_result(self) -> Result<V, E> {
        self.result
    }
}

struct Inner<K, V, E> {
    name: String,
    ttl: Duration,
    store: EntryStore<K, V, E>,
    update: Box<dyn UpdateFunction<K, V, E>>,
    metrics: CacheMetrics,
}

/// A handle to a cache instance.  Cloning the handle is cheap and the
/// clones all refer to the same underlying entries.
pub struct Cache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for Cache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> Cache<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(
        ttl: Duration,
        update: impl UpdateFunction<K, V, E> + 'static,
    ) -> Result<Self, ConfigError> {
        Self::new_named("<anonymous>", ttl, update)
    }

    pub fn new_named<S: Into<String>>(
        name: S,
        ttl: Duration,
        update: impl UpdateFunction<K, V, E> + 'static,
    ) -> Result<Self, ConfigError> {
        Self::from_params(
            CacheParams {
                name: name.into(),
                ttl,
            },
            update,
        )
    }

    pub fn from_params(
        params: CacheParams,
        update: impl UpdateFunction<K, V, E> + 'static,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        let CacheParams { name, ttl } = params;

        let metrics = CacheMetrics::new(&name);
        let store = EntryStore::new(metrics.size.clone());
        tracing::debug!("created cache {name} with ttl {ttl:?}");

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                ttl,
                store,
                update: Box::new(update),
                metrics,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Returns the number of keys in the cache, including those
    /// whose results have expired
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the entry for `key` without triggering a fill.
    /// The returned entry may be stale; check `EntrySnapshot::is_fresh`.
    pub fn lookup<Q>(&self, key: &Q) -> Option<EntrySnapshot<V, E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.store.lookup(key)
    }

    /// Get the result for `key`, running the update function to
    /// produce it if there is no fresh result and nobody else is
    /// already doing so.
    ///
    /// `ctx` is passed to the update function if this call ends up
    /// running it.  Otherwise it is only consulted while waiting for
    /// another caller's fill: if it is cancelled or its deadline passes,
    /// this call returns the corresponding `CacheError` without
    /// affecting the fill or any other waiter.
    pub async fn get(&self, ctx: &Context, key: K) -> Result<Lookup<V, E>, CacheError> {
        let inner = &*self.inner;
        inner.metrics.lookup.inc();

        match inner.store.claim_for_fill(key) {
            Claim::AlreadyFresh(item) => {
                inner.metrics.hit.inc();
                Ok(Lookup::from_item(item, true))
            }
            Claim::MustWait(waiter) => {
                let item = wait_for_fill(&inner.name, ctx, waiter, &inner.metrics).await?;
                inner.metrics.hit.inc();
                Ok(Lookup::from_item(item, true))
            }
            Claim::BecameLeader(ticket) => {
                inner.metrics.miss.inc();
                let item = run_fill(
                    &inner.name,
                    ticket,
                    ctx,
                    &*inner.update,
                    inner.ttl,
                    &inner.metrics,
                )
                .await?;
                Ok(Lookup::from_item(item, false))
            }
        }
    }
}
