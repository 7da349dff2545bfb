use thiserror::Error;

/// Boxed error type accepted from producer functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The producer failed on a cold miss. Nothing was cached; the error
    /// belongs to the caller.
    #[error("producer failed: {0}")]
    Producer(#[source] BoxError),
}

impl CacheError {
    pub fn producer(error: impl Into<BoxError>) -> Self {
        Self::Producer(error.into())
    }
}
