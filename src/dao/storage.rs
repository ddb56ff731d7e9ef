use std::error::Error;
use thiserror::Error;

/// Result alias for match store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of a match store, independent of the backend behind it.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("match store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
