//! The RabbitMQ worker and its configuration.

use crate::error::WorkerError;
use crate::handler::MessageHandler;
use futures_util::TryStreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
    Connection, ConnectionProperties, ExchangeKind,
};
use std::sync::Arc;

/// Configuration for a `RabbitMqWorker`.
///
/// Use the `WorkerConfig::builder()` method to construct this struct.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// The name of the queue to consume messages from.
    pub queue_name: String,
    /// The name of the exchange to bind the queue to.
    pub exchange_name: String,
    /// The routing key for the binding between the exchange and the queue.
    pub routing_key: String,
    /// A unique identifier for the consumer on this queue.
    pub consumer_tag: String,
    /// The AMQP URL for connecting to the RabbitMQ broker.
    pub rabbitmq_url: String,
    /// How many times the broker delivers a message before dead-lettering it.
    pub delivery_limit: u32,
    /// The number of messages to fetch from the server at a time (QoS prefetch count).
    pub prefetch_count: u16,
}

impl WorkerConfig {
    /// Creates a new `WorkerConfigBuilder` to start building the worker configuration.
    ///
    /// # Arguments
    /// * `queue_name` - The name of the queue to consume from.
    /// * `rabbitmq_url` - The connection URL for the RabbitMQ broker.
    pub fn builder(queue_name: String, rabbitmq_url: String) -> WorkerConfigBuilder {
        WorkerConfigBuilder::new(queue_name, rabbitmq_url)
    }
}

/// A builder for creating `WorkerConfig` instances.
pub struct WorkerConfigBuilder {
    queue_name: String,
    rabbitmq_url: String,
    exchange_name: Option<String>,
    routing_key: Option<String>,
    consumer_tag: Option<String>,
    delivery_limit: Option<u32>,
    prefetch_count: Option<u16>,
}

impl WorkerConfigBuilder {
    /// Creates a new builder with the required fields.
    fn new(queue_name: String, rabbitmq_url: String) -> Self {
        Self {
            queue_name,
            rabbitmq_url,
            exchange_name: None,
            routing_key: None,
            consumer_tag: None,
            delivery_limit: None,
            prefetch_count: None,
        }
    }

    /// Sets a custom exchange name.
    /// Defaults to `{queue_name}_exchange` if not set.
    pub fn exchange_name(mut self, exchange_name: String) -> Self {
        self.exchange_name = Some(exchange_name);
        self
    }

    /// Sets a custom routing key.
    /// Defaults to `{queue_name}.process` if not set.
    pub fn routing_key(mut self, routing_key: String) -> Self {
        self.routing_key = Some(routing_key);
        self
    }

    /// Sets a custom consumer tag.
    /// Defaults to `{queue_name}_consumer` if not set.
    pub fn consumer_tag(mut self, consumer_tag: String) -> Self {
        self.consumer_tag = Some(consumer_tag);
        self
    }

    /// Sets the broker-side delivery limit before a message is dead-lettered.
    /// Defaults to 10.
    pub fn delivery_limit(mut self, delivery_limit: u32) -> Self {
        self.delivery_limit = Some(delivery_limit);
        self
    }

    /// Sets a custom prefetch count (QoS).
    /// Defaults to 1.
    ///
    /// **Warning:** Setting this to a value greater than 1 means your `MessageHandler`
    /// may be called concurrently. Ensure your handler is thread-safe.
    pub fn prefetch_count(mut self, count: u16) -> Self {
        self.prefetch_count = Some(count);
        self
    }

    /// Builds the final `WorkerConfig`, applying defaults for any unset options.
    pub fn build(self) -> WorkerConfig {
        let queue_name = self.queue_name;
        WorkerConfig {
            exchange_name: self
                .exchange_name
                .unwrap_or_else(|| format!("{}_exchange", queue_name)),
            routing_key: self
                .routing_key
                .unwrap_or_else(|| format!("{}.process", queue_name)),
            consumer_tag: self
                .consumer_tag
                .unwrap_or_else(|| format!("{}_consumer", queue_name)),
            delivery_limit: self.delivery_limit.unwrap_or(10),
            prefetch_count: self.prefetch_count.unwrap_or(1),
            queue_name,
            rabbitmq_url: self.rabbitmq_url,
        }
    }
}

/// Names for the dead-letter infrastructure, derived from the queue name.
#[derive(Clone, Debug)]
struct DlxNames {
    dlx_exchange: String,
    dlq_queue: String,
    dlq_routing_key: String,
}

impl DlxNames {
    fn new(base_name: &str) -> Self {
        Self {
            dlx_exchange: format!("{}_dlx", base_name),
            dlq_queue: format!("{}_dlq", base_name),
            dlq_routing_key: format!("{}.failed", base_name),
        }
    }
}

/// A RabbitMQ worker that processes messages from a queue.
///
/// The worker performs no local retry. Failed deliveries are nacked with
/// requeue; the broker counts deliveries and routes a message to the
/// dead-letter queue once the queue's delivery limit is exhausted.
pub struct RabbitMqWorker<H: MessageHandler> {
    handler: Arc<H>,
    config: WorkerConfig,
}

impl<H: MessageHandler + 'static> RabbitMqWorker<H> {
    /// Creates a new worker.
    pub fn new(handler: Arc<H>, config: WorkerConfig) -> Self {
        Self { handler, config }
    }

    /// Connects to RabbitMQ, sets up the consumer, and runs the message processing loop.
    ///
    /// This function will run until the connection is lost or the consumer is cancelled.
    /// The application is responsible for handling reconnection and graceful shutdown.
    pub async fn run(&self) -> Result<(), WorkerError> {
        log::info!(
            "Connecting to RabbitMQ and setting up worker '{}' for queue '{}'...",
            self.handler.handler_name(),
            self.config.queue_name
        );

        let connection =
            Connection::connect(&self.config.rabbitmq_url, ConnectionProperties::default())
                .await?;
        let channel = connection.create_channel().await?;

        self.setup_infrastructure(&channel).await?;

        channel
            .basic_qos(self.config.prefetch_count, BasicQosOptions::default())
            .await?;
        log::info!("QoS prefetch count set to {}", self.config.prefetch_count);

        let consumer = channel
            .basic_consume(
                &self.config.queue_name,
                &self.config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        log::info!(
            "Consumer started with tag '{}'. Waiting for messages...",
            consumer.tag().as_str()
        );

        let handler = self.handler.clone();
        consumer
            .try_for_each(move |delivery| {
                let handler = handler.clone();
                async move {
                    if let Err(e) = Self::process_delivery(delivery, handler).await {
                        log::error!("Message processing failed with a recoverable error: {}", e);
                    }
                    Ok(())
                }
            })
            .await?;

        Ok(())
    }

    /// Declares the exchanges and queues, and binds them together.
    ///
    /// The main queue is a durable quorum queue with a delivery limit and a
    /// dead-letter exchange, so exhausted messages land in `{queue}_dlq`
    /// without any worker involvement.
    async fn setup_infrastructure(&self, channel: &lapin::Channel) -> Result<(), WorkerError> {
        let names = DlxNames::new(&self.config.queue_name);

        // Dead-letter exchange and queue first, so the main queue can point at them.
        channel
            .exchange_declare(
                &names.dlx_exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                &names.dlq_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                &names.dlq_queue,
                &names.dlx_exchange,
                &names.dlq_routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        channel
            .exchange_declare(
                &self.config.exchange_name,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let mut queue_args = FieldTable::default();
        queue_args.insert("x-queue-type".into(), AMQPValue::LongString("quorum".into()));
        queue_args.insert(
            "x-delivery-limit".into(),
            AMQPValue::LongInt(self.config.delivery_limit as i32),
        );
        queue_args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(names.dlx_exchange.clone().into()),
        );
        queue_args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(names.dlq_routing_key.clone().into()),
        );

        channel
            .queue_declare(
                &self.config.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                queue_args,
            )
            .await?;

        channel
            .queue_bind(
                &self.config.queue_name,
                &self.config.exchange_name,
                &self.config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        log::info!(
            "Queue '{}' is bound to exchange '{}' with dead-lettering to '{}'",
            self.config.queue_name,
            self.config.exchange_name,
            names.dlq_queue
        );
        Ok(())
    }

    /// The core logic for processing a single delivered message.
    async fn process_delivery(delivery: Delivery, handler: Arc<H>) -> Result<(), WorkerError> {
        let delivery_tag = delivery.delivery_tag;

        match handler.handle(&delivery.data).await {
            Ok(()) => {
                delivery.ack(BasicAckOptions::default()).await?;
                log::info!("Message processed successfully. Tag: {}", delivery_tag);
            }
            Err(e) => {
                log::error!("Failed to process message. Tag: {}, Error: {}", delivery_tag, e);
                // Requeue so the broker counts the delivery; once the queue's
                // delivery limit is exhausted the broker dead-letters it.
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?;
                log::info!("Message nacked for redelivery. Tag: {}", delivery_tag);
            }
        }

        Ok(())
    }
}
