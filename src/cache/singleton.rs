use super::LoadFailure;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::Instant;

type Loader<V, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<V, LoadFailure<E>>>>;

struct Snapshot<V, E> {
    started_at: Instant,
    load: SharedLoad<V, E>,
}

/// Single value cache reused for `freshness_window` after its load started.
///
/// Lookups inside the window (or while a load is in progress) join the
/// current load. After the window a new load is started. A failed load is
/// reused for the rest of its window just like a successful one.
pub struct SingletonCache<V, E> {
    name: &'static str,
    freshness_window: Duration,
    state: parking_lot::Mutex<Option<Snapshot<V, E>>>,
    loader: Loader<V, E>,
}

impl<V, E> SingletonCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, freshness_window: Duration, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self {
            name,
            freshness_window,
            state: Default::default(),
            loader: Arc::new(move || loader().boxed()),
        }
    }

    pub async fn get(&self) -> Result<V, LoadFailure<E>> {
        let load = {
            let mut state = self.state.lock();
            match state.as_ref() {
                Some(snapshot) if self.is_usable(snapshot) => snapshot.load.clone(),
                _ => {
                    tracing::debug!(target: "singleton_cache", cache = self.name, "loading value");
                    let load = self.spawn_load();
                    *state = Some(Snapshot {
                        started_at: Instant::now(),
                        load: load.clone(),
                    });
                    load
                }
            }
        };
        load.await
    }

    /// Drops the stored value so that the next lookup loads it again.
    pub fn invalidate(&self) {
        *self.state.lock() = None;
    }

    fn is_usable(&self, snapshot: &Snapshot<V, E>) -> bool {
        snapshot.load.peek().is_none() || snapshot.started_at.elapsed() < self.freshness_window
    }

    fn spawn_load(&self) -> SharedLoad<V, E> {
        let handle = tokio::spawn((self.loader)());
        async move {
            match handle.await {
                Ok(result) => result.map_err(LoadFailure::Loader),
                Err(err) => Err(LoadFailure::Aborted(err.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}
