
//! # userdata-worker
//! Consumes user data messages from a RabbitMQ queue, validates them, and
//! persists each one as a row in the `UserData` table.
//!
//! Failed messages are nacked back to the broker; redelivery counting and
//! dead-lettering are the broker's job, not this crate's.

pub mod error;
pub mod handler;
pub mod message;
pub mod worker;
pub mod writer;

// Re-export key components for easy access
pub use error::{ConfigError, HandlerError, WorkerError, WriteError};
pub use handler::{MessageHandler, UserDataHandler};
pub use message::UserDataMessage;
pub use worker::{RabbitMqWorker, WorkerConfig};
pub use writer::RecordWriter;
