//! Running a fill as the elected leader, and waiting on someone
//! else's fill.
use crate::metrics::CacheMetrics;
use crate::store::{FillTicket, FillWaiter, Item};
use crate::{CacheError, Context, UpdateFunction};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

pub(crate) async fn run_fill<K, V, E>(
    name: &str,
    ticket: FillTicket<'_, K, V, E>,
    ctx: &Context,
    update: &dyn UpdateFunction<K, V, E>,
    ttl: Duration,
    metrics: &CacheMetrics,
) -> Result<Item<V, E>, CacheError>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    tracing::trace!("{name}: populating entry");
    metrics.populated.inc();

    // The ticket is held across this await; if we are cancelled or
    // the update panics, dropping it releases any waiters.
    let outcome = update.update(ctx, ticket.key()).await;
    match outcome {
        Ok(result) => {
            if result.is_err() {
                metrics.cached_error.inc();
            }
            let item = ticket.install(result, ttl);
            tracing::trace!("{name}: installed entry");
            Ok(item)
        }
        Err(err) => {
            metrics.error.inc();
            let err = CacheError::Update(Arc::new(err));
            ticket.abandon(err.clone());
            tracing::trace!("{name}: fill failed; entry remains eligible for retry");
            Err(err)
        }
    }
}

pub(crate) async fn wait_for_fill<V: Clone, E: Clone>(
    name: &str,
    ctx: &Context,
    mut waiter: FillWaiter<V, E>,
    metrics: &CacheMetrics,
) -> Result<Item<V, E>, CacheError> {
    tracing::trace!("{name}: waiting for entry to populate");
    metrics.wait.inc();
    let _waiting = scopeguard::guard((), |_| metrics.wait.dec());

    tokio::select! {
        biased;

        outcome = waiter.wait_for(Option::is_some) => {
            match outcome {
                Ok(outcome) => (*outcome).clone().unwrap_or(Err(CacheError::Abandoned)),
                // The sender is only ever dropped after publishing
                // an outcome, but treat a closed channel the same way
                Err(_) => Err(CacheError::Abandoned),
            }
        }
        err = ctx.done() => {
            tracing::trace!("{name}: caller stopped waiting for entry");
            Err(err)
        }
    }
}
