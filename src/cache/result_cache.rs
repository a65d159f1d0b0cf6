use super::LoadFailure;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use std::{collections::HashMap, fmt::Debug, future::Future, hash::Hash, sync::Arc};
use thiserror::Error;

type Loader<K, C, V, E> = Arc<dyn Fn(K, C) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<V, LoadFailure<E>>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError<E> {
    /// The computation started (or joined) by this lookup failed.
    #[error("{0}")]
    Load(LoadFailure<E>),
    /// The key holds the failure of an earlier computation; it stays until cleared.
    #[error("cached failure: {0}")]
    EntryFailed(LoadFailure<E>),
}

impl<E> CacheError<E> {
    pub fn failure(&self) -> &LoadFailure<E> {
        match self {
            CacheError::Load(failure) | CacheError::EntryFailed(failure) => failure,
        }
    }

    pub fn into_failure(self) -> LoadFailure<E> {
        match self {
            CacheError::Load(failure) | CacheError::EntryFailed(failure) => failure,
        }
    }
}

/// Single-flight memoization of an async computation per key.
///
/// Concurrent lookups of the same key share one computation. The entry is
/// recorded before the computation starts, so a key is never computed twice
/// until it is cleared. Computations run on their own task and finish even
/// if every waiter goes away. Failures are recorded as well and are only
/// dropped by [`ResultCache::clear`] or [`ResultCache::clear_key`].
///
/// The context `C` is handed to the loader together with the key but is not
/// part of the identity of an entry.
pub struct ResultCache<K, V, E, C = ()> {
    name: &'static str,
    entries: parking_lot::Mutex<HashMap<K, SharedLoad<V, E>>>,
    loader: Loader<K, C, V, E>,
}

impl<K, V, E, C> ResultCache<K, V, E, C>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Send + 'static,
{
    pub fn new<F, Fut>(name: &'static str, loader: F) -> Self
    where
        F: Fn(K, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let loader: Loader<K, C, V, E> = Arc::new(move |key, context| loader(key, context).boxed());
        Self {
            name,
            entries: Default::default(),
            loader,
        }
    }

    pub async fn lookup(&self, key: K, context: C) -> Result<V, CacheError<E>> {
        let load = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(load) => {
                    if let Some(Err(failure)) = load.peek() {
                        tracing::debug!(target: "result_cache", cache = self.name, key = ?key, "returning cached failure");
                        return Err(CacheError::EntryFailed(failure.clone()));
                    }
                    load.clone()
                }
                None => {
                    tracing::debug!(target: "result_cache", cache = self.name, key = ?key, "starting computation");
                    let load = self.spawn_load(key.clone(), context);
                    entries.insert(key, load.clone());
                    load
                }
            }
        };
        load.await.map_err(CacheError::Load)
    }

    fn spawn_load(&self, key: K, context: C) -> SharedLoad<V, E> {
        let handle = tokio::spawn((self.loader)(key, context));
        async move {
            match handle.await {
                Ok(result) => result.map_err(LoadFailure::Loader),
                Err(err) => Err(LoadFailure::Aborted(err.to_string())),
            }
        }
        .boxed()
        .shared()
    }

    /// Drops every entry. Computations in progress keep running for their
    /// current waiters, but later lookups start fresh ones.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        tracing::debug!(target: "result_cache", cache = self.name, entries = entries.len(), "clearing cache");
        entries.clear();
    }

    pub fn clear_key(&self, key: &K) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drops the entry of `key` only if it holds a finished failure.
    /// A computation in progress or a success is left in place.
    pub fn clear_failed(&self, key: &K) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(key).and_then(|load| load.peek()) {
            Some(Err(_)) => entries.remove(key).is_some(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::sync::Notify;

    fn counting_cache(
        calls: Arc<AtomicUsize>,
        release: Arc<Notify>,
    ) -> ResultCache<u32, String, String> {
        ResultCache::new("test", move |key: u32, _: ()| {
            let calls = calls.clone();
            let release = release.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                release.notified().await;
                if key == 0 {
                    Err("zero is not allowed".to_string())
                } else {
                    Ok(format!("value-{key}"))
                }
            }
        })
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_computation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let cache = Arc::new(counting_cache(calls.clone(), release.clone()));

        let lookups: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.lookup(7, ()).await })
            })
            .collect();
        // let every lookup register before the computation finishes
        tokio::time::sleep(Duration::from_millis(50)).await;
        release.notify_one();

        for lookup in lookups {
            assert_eq!(lookup.await.unwrap(), Ok("value-7".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.lookup(7, ()).await, Ok("value-7".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let cache = Arc::new(counting_cache(calls.clone(), release.clone()));

        let lookups: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.lookup(0, ()).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        release.notify_one();

        for lookup in lookups {
            assert_eq!(
                lookup.await.unwrap(),
                Err(CacheError::Load(LoadFailure::Loader(
                    "zero is not allowed".to_string()
                )))
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_failed_keeps_running_and_successful_entries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let cache = Arc::new(counting_cache(calls.clone(), release.clone()));

        release.notify_one();
        cache.lookup(0, ()).await.unwrap_err();
        release.notify_one();
        cache.lookup(1, ()).await.unwrap();
        assert!(!cache.clear_failed(&1));
        assert!(cache.clear_failed(&0));
        assert!(!cache.clear_failed(&0));

        let running = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.lookup(0, ()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!cache.clear_failed(&0), "computation in progress must stay");
        release.notify_one();
        running.await.unwrap().unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn different_keys_are_computed_separately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: ResultCache<u32, u32, String> = {
            let calls = calls.clone();
            ResultCache::new("test", move |key: u32, _: ()| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(key * 2) }
            })
        };
        assert_eq!(cache.lookup(1, ()).await, Ok(2));
        assert_eq!(cache.lookup(2, ()).await, Ok(4));
        assert_eq!(cache.lookup(1, ()).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn clear_forces_new_computation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let cache = counting_cache(calls.clone(), release.clone());

        release.notify_one();
        cache.lookup(3, ()).await.unwrap();
        cache.clear();
        assert!(cache.is_empty());

        release.notify_one();
        cache.lookup(3, ()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_stay_until_cleared() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let cache = counting_cache(calls.clone(), release.clone());

        release.notify_one();
        let first = cache.lookup(0, ()).await.unwrap_err();
        assert_eq!(
            first,
            CacheError::Load(LoadFailure::Loader("zero is not allowed".into()))
        );

        let second = cache.lookup(0, ()).await.unwrap_err();
        assert_eq!(
            second,
            CacheError::EntryFailed(LoadFailure::Loader("zero is not allowed".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(cache.clear_key(&0));
        release.notify_one();
        cache.lookup(0, ()).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn computation_survives_cancelled_caller() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let cache = counting_cache(calls.clone(), release.clone());

        let cancelled = tokio::time::timeout(Duration::from_millis(20), cache.lookup(5, ())).await;
        assert!(cancelled.is_err(), "lookup should still be waiting");

        release.notify_one();
        assert_eq!(cache.lookup(5, ()).await, Ok("value-5".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn context_is_passed_to_loader() {
        let cache: ResultCache<&'static str, String, String, String> =
            ResultCache::new("test", |key: &'static str, context: String| async move {
                Ok(format!("{key}:{context}"))
            });
        assert_eq!(
            cache.lookup("a", "first".into()).await,
            Ok("a:first".to_string())
        );
        // context is not part of the key
        assert_eq!(
            cache.lookup("a", "second".into()).await,
            Ok("a:first".to_string())
        );
    }
}
