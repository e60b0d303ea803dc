
use thiserror::Error;

/// Errors produced while handling a single queue message.
///
/// Every variant is re-raised to the worker loop, which nacks the delivery so
/// the broker's redelivery and dead-letter policy takes over. Nothing is
/// retried locally.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload is not valid JSON of the expected shape.
    #[error("malformed message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    /// The payload parsed but carries no usable value (a literal `null`).
    #[error("message payload is empty")]
    EmptyPayload,

    /// Domain validation failed for the named field.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The record writer could not execute the insert.
    #[error("failed to persist record: {0}")]
    PersistenceFailed(#[from] WriteError),
}

/// Errors from the database writer.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The underlying store rejected or could not execute the write.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Startup configuration errors. Fatal at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The named environment variable holding the connection string is not set.
    #[error("required connection string variable '{0}' is not set")]
    MissingConnectionString(&'static str),
}

/// Errors from the worker's consume loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Error originating from the underlying `lapin` library.
    #[error("RabbitMQ communication error: {0}")]
    Lapin(#[from] lapin::Error),
}
