use thiserror::Error;

/// Failure talking to the storage backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
