//! Broker abstraction used by the tap.
//!
//! The tap needs only a handful of AMQP operations: connect, open a channel,
//! declare a throwaway queue, bind it and consume from it. These traits expose
//! exactly that, so the tap can run against RabbitMQ ([`LapinBroker`]) or an
//! in-process broker ([`MemoryBroker`]).

mod amqp;
mod memory;

pub use amqp::LapinBroker;
pub use memory::{topic_matches, MemoryBroker};

use crate::error::ConnectionError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use messaging::Delivery;

/// Deliveries from a consumer. An `Err` item is fatal; the stream ending means
/// the consumer was cancelled or the connection went away.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, ConnectionError>>;

/// Queue declaration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub exclusive: bool,
    pub durable: bool,
    pub auto_delete: bool,
}

impl QueueOptions {
    /// Private to this connection, not persisted, removed once unused.
    pub fn transient() -> Self {
        Self {
            exclusive: true,
            durable: false,
            auto_delete: true,
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::transient()
    }
}

/// Entry point: something that can open connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broker: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn BrokerConnection>, ConnectionError>;
}

/// An open broker connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn create_channel(&self) -> Result<Box<dyn BrokerChannel>, ConnectionError>;

    /// Close the connection and every channel on it.
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// A channel on an open connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a queue. An empty `name` asks the broker to generate one.
    /// Returns the actual queue name.
    async fn assert_queue(&self, name: &str, options: QueueOptions)
        -> Result<String, ConnectionError>;

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), ConnectionError>;

    /// Start consuming without acknowledgements.
    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, ConnectionError>;
}
