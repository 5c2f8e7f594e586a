use thiserror::Error;

/// Errors that can occur when interacting with the event bus or an outbox.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus did not accept a publish.
    #[error("Publish to topic '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    /// The bus backend is unreachable.
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The outbox storage failed.
    #[error("Outbox storage error: {0}")]
    Outbox(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BusError {
    /// Wraps a storage error raised by an outbox implementation.
    pub fn outbox(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        BusError::Outbox(Box::new(err))
    }
}

/// Result type for event bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
