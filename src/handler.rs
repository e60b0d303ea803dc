
//! Defines the core trait for message handling logic and the user data handler.

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::message::UserDataMessage;
use crate::writer::RecordWriter;

/// A trait for processing raw messages from a RabbitMQ queue.
///
/// The handler owns deserialization and validation of the payload; the worker
/// loop only decides ack or nack from the returned result.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes a single raw message payload.
    ///
    /// # Returns
    /// `Ok(())` if the message was processed successfully, or a `HandlerError`
    /// the worker interprets as "redeliver".
    async fn handle(&self, raw: &[u8]) -> Result<(), HandlerError>;

    /// A name for the handler, used for logging and identification.
    fn handler_name(&self) -> &str;
}

/// Processes user data messages: deserialize, validate, insert.
///
/// Performs no local retry. Any failure is logged with the offending data and
/// re-raised so the broker's redelivery policy applies.
pub struct UserDataHandler {
    writer: RecordWriter,
}

impl UserDataHandler {
    /// Creates a handler backed by the given writer.
    pub fn new(writer: RecordWriter) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl MessageHandler for UserDataHandler {
    fn handler_name(&self) -> &str {
        "UserDataHandler"
    }

    async fn handle(&self, raw: &[u8]) -> Result<(), HandlerError> {
        log::info!("Processing message: {}", String::from_utf8_lossy(raw));

        // A literal `null` payload parses as None rather than a parse error.
        let message: Option<UserDataMessage> = serde_json::from_slice(raw).map_err(|e| {
            log::error!(
                "Failed to deserialize message {:?}: {}",
                String::from_utf8_lossy(raw),
                e
            );
            HandlerError::MalformedMessage(e)
        })?;

        let Some(message) = message else {
            log::error!("Message payload is empty");
            return Err(HandlerError::EmptyPayload);
        };

        message.validate()?;

        log::info!(
            "Saving user data to database: Name={}, Age={}",
            message.name,
            message.age
        );

        self.writer
            .insert(&message.name, message.age)
            .await
            .map_err(|e| {
                log::error!("Error saving user data for '{}': {}", message.name, e);
                HandlerError::PersistenceFailed(e)
            })?;

        log::info!(
            "Successfully processed and saved user data for: {}",
            message.name
        );
        Ok(())
    }
}
