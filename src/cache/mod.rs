mod result_cache;
mod singleton;

pub use result_cache::{CacheError, ResultCache};
pub use singleton::SingletonCache;

use thiserror::Error;

/// Outcome of a failed computation, shared between every waiter of that computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure<E> {
    #[error("{0}")]
    Loader(E),
    #[error("computation was aborted: {0}")]
    Aborted(String),
}
