use crate::context::instant_after;
use crate::CacheError;
use parking_lot::Mutex;
use prometheus::IntGauge;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// An installed result, along with the time at which it stops being fresh
#[derive(Debug, Clone)]
pub struct Item<V, E> {
    pub result: Result<V, E>,
    pub expiration: Instant,
}

impl<V, E> Item<V, E> {
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expiration
    }
}

/// A point-in-time copy of an entry in the cache
#[derive(Debug, Clone)]
pub struct EntrySnapshot<V, E> {
    /// The most recently installed result, if any.  It may be stale.
    pub item: Option<Item<V, E>>,
    /// true if some caller is currently running the update function
    /// for this entry
    pub filling: bool,
}

impl<V, E> EntrySnapshot<V, E> {
    pub fn is_fresh(&self) -> bool {
        self.item.as_ref().map(Item::is_fresh).unwrap_or(false)
    }
}

/// What a fill cycle resolved to.  Each cycle has its own channel, so
/// a waiter only ever sees the outcome of the cycle that it joined.
pub(crate) type FillOutcome<V, E> = Result<Item<V, E>, CacheError>;
pub(crate) type FillWaiter<V, E> = watch::Receiver<Option<FillOutcome<V, E>>>;
type FillSignal<V, E> = watch::Sender<Option<FillOutcome<V, E>>>;

struct CacheEntry<V, E> {
    item: Option<Item<V, E>>,
    /// Present while a fill is in progress
    fill: Option<FillWaiter<V, E>>,
}

pub(crate) enum Claim<'a, K: Hash + Eq, V, E> {
    AlreadyFresh(Item<V, E>),
    BecameLeader(FillTicket<'a, K, V, E>),
    MustWait(FillWaiter<V, E>),
}

pub(crate) struct EntryStore<K, V, E> {
    entries: Mutex<HashMap<K, CacheEntry<V, E>>>,
    size: IntGauge,
}

impl<K: Hash + Eq + Clone, V: Clone, E: Clone> EntryStore<K, V, E> {
    pub fn new(size: IntGauge) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn lookup<Q>(&self, key: &Q) -> Option<EntrySnapshot<V, E>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        Some(EntrySnapshot {
            item: entry.item.clone(),
            filling: entry.fill.is_some(),
        })
    }

    /// Decide, atomically wrt. all other callers, whether `key` can be
    /// satisfied from the store, is being filled by someone else, or
    /// must be filled by the caller.
    pub fn claim_for_fill(&self, key: K) -> Claim<'_, K, V, E> {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(&key) {
            if let Some(item) = &entry.item {
                if item.is_fresh() {
                    return Claim::AlreadyFresh(item.clone());
                }
            }
            if let Some(waiter) = &entry.fill {
                return Claim::MustWait(waiter.clone());
            }
            let (signal, waiter) = watch::channel(None);
            entry.fill.replace(waiter);
            return Claim::BecameLeader(FillTicket::new(self, key, signal));
        }

        let (signal, waiter) = watch::channel(None);
        entries.insert(
            key.clone(),
            CacheEntry {
                item: None,
                fill: Some(waiter),
            },
        );
        self.size.set(entries.len() as i64);
        Claim::BecameLeader(FillTicket::new(self, key, signal))
    }

    fn install_result(
        &self,
        key: &K,
        result: Result<V, E>,
        ttl: Duration,
        signal: &FillSignal<V, E>,
    ) -> Item<V, E> {
        let item = Item {
            result,
            expiration: instant_after(ttl),
        };
        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get_mut(key) {
                entry.item.replace(item.clone());
                entry.fill.take();
            }
        }
        signal.send_replace(Some(Ok(item.clone())));
        item
    }
}

/// Held by the leader of a fill cycle.
/// The cycle ends either by `install`, by `abandon`, or by dropping the
/// ticket, which abandons the fill with `CacheError::Abandoned` so that
/// waiters are never left hanging if the leader is cancelled or panics.
pub(crate) struct FillTicket<'a, K: Hash + Eq, V, E> {
    store: &'a EntryStore<K, V, E>,
    key: K,
    signal: FillSignal<V, E>,
    completed: bool,
}

impl<'a, K: Hash + Eq, V, E> FillTicket<'a, K, V, E> {
    fn new(store: &'a EntryStore<K, V, E>, key: K, signal: FillSignal<V, E>) -> Self {
        Self {
            store,
            key,
            signal,
            completed: false,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn abandon(mut self, err: CacheError) {
        self.completed = true;
        self.store.abandon_fill(&self.key, err, &self.signal);
    }
}

impl<K: Hash + Eq + Clone, V: Clone, E: Clone> FillTicket<'_, K, V, E> {
    pub fn install(mut self, result: Result<V, E>, ttl: Duration) -> Item<V, E> {
        self.completed = true;
        self.store.install_result(&self.key, result, ttl, &self.signal)
    }
}

impl<K: Hash + Eq, V, E> Drop for FillTicket<'_, K, V, E> {
    fn drop(&mut self) {
        if !self.completed {
            self.store
                .abandon_fill(&self.key, CacheError::Abandoned, &self.signal);
        }
    }
}

impl<K: Hash + Eq, V, E> EntryStore<K, V, E> {
    fn abandon_fill(&self, key: &K, err: CacheError, signal: &FillSignal<V, E>) {
        {
            let mut entries = self.entries.lock();
            let never_filled = match entries.get_mut(key) {
                Some(entry) => {
                    entry.fill.take();
                    entry.item.is_none()
                }
                None => false,
            };
            // A placeholder created by this claim goes away again so
            // that the key reads as absent, just as it did before.
            if never_filled {
                entries.remove(key);
                self.size.set(entries.len() as i64);
            }
        }
        signal.send_replace(Some(Err(err)));
    }
}
