use crate::Context;
use async_trait::async_trait;
use std::future::Future;

/// Computes a fresh value for a key on behalf of a `Cache`.
///
/// The outer `anyhow::Result` reports whether the fill itself could be
/// completed.  An `Err` there is a transient failure: it is handed to
/// every caller that was waiting on this fill, but is never stored,
/// so the next `get` will call `update` again.
///
/// The inner `Result<V, E>` is always stored and replayed until it
/// expires, including when it holds an `Err`.  Use that for answers
/// that are themselves errors, such as "no such record".
///
/// The cache guarantees that `update` is never running more than once
/// at a time for the same key, but it may run concurrently for
/// different keys.
#[async_trait]
pub trait UpdateFunction<K, V, E>: Send + Sync {
    async fn update(&self, ctx: &Context, key: &K) -> anyhow::Result<Result<V, E>>;
}

#[async_trait]
impl<K, V, E, F, Fut> UpdateFunction<K, V, E> for F
where
    F: Fn(Context, K) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Result<V, E>>> + Send,
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    async fn update(&self, ctx: &Context, key: &K) -> anyhow::Result<Result<V, E>> {
        (self)(ctx.clone(), key.clone()).await
    }
}
