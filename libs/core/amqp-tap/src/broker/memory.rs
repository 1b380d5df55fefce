//! In-process broker with topic-exchange routing.
//!
//! Used by tests and for running the tap without a RabbitMQ server. Every
//! exchange routes like an AMQP topic exchange; queues are always transient
//! and disappear when the connection that declared them closes.

use super::{Broker, BrokerChannel, BrokerConnection, DeliveryStream, QueueOptions};
use crate::error::{ConnectStep, ConnectionError};
use async_trait::async_trait;
use futures::StreamExt;
use messaging::{Delivery, DeliveryInfo, MessageProperties};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::trace;

type DeliverySender = mpsc::UnboundedSender<Result<Delivery, ConnectionError>>;

/// Whether an AMQP topic `pattern` matches `routing_key`.
///
/// Words are separated by `.`; `*` matches exactly one word and `#` matches
/// zero or more words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && match_words(rest, &key[1..]),
    }
}

struct MemoryQueue {
    owner: u64,
    bindings: Vec<(String, String)>,
    consumer: Option<DeliverySender>,
    next_delivery_tag: u64,
}

#[derive(Default)]
struct MemoryState {
    exchanges: HashSet<String>,
    queues: HashMap<String, MemoryQueue>,
    failures: HashSet<ConnectStep>,
    next_id: u64,
    open_connections: usize,
}

impl MemoryState {
    fn fail_if_requested(&mut self, step: ConnectStep) -> Result<(), String> {
        if self.failures.remove(&step) {
            Err(format!("injected {step} failure"))
        } else {
            Ok(())
        }
    }
}

/// In-memory broker. Clones share state, so a test can keep one handle to
/// publish while the tap owns another.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// A broker with the standard `amq.topic` exchange declared.
    pub fn new() -> Self {
        let broker = Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
        };
        broker.declare_exchange("amq.topic");
        broker
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn declare_exchange(&self, name: impl Into<String>) {
        self.lock().exchanges.insert(name.into());
    }

    /// Make the next attempt at `step` fail.
    pub fn fail_next(&self, step: ConnectStep) {
        self.lock().failures.insert(step);
    }

    /// Route a message to every queue bound to `exchange` with a matching
    /// pattern. Returns how many consumers it was delivered to.
    pub fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        content: impl Into<Vec<u8>>,
        properties: MessageProperties,
    ) -> usize {
        let content = content.into();
        let mut state = self.lock();
        let mut delivered = 0;

        for queue in state.queues.values_mut() {
            let routed = queue
                .bindings
                .iter()
                .any(|(ex, pattern)| ex == exchange && topic_matches(pattern, routing_key));
            let Some(consumer) = queue.consumer.as_ref().filter(|_| routed) else {
                continue;
            };

            queue.next_delivery_tag += 1;
            let delivery = Delivery::new(content.clone())
                .with_properties(properties.clone())
                .with_delivery_info(DeliveryInfo {
                    consumer_tag: String::new(),
                    delivery_tag: queue.next_delivery_tag,
                    redelivered: false,
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                });
            if consumer.send(Ok(delivery)).is_ok() {
                delivered += 1;
            }
        }

        trace!(exchange, routing_key, delivered, "Published message");
        delivered
    }

    /// Push a fatal error into every active consumer stream.
    pub fn fail_consumers(&self, message: &str) {
        for queue in self.lock().queues.values() {
            if let Some(consumer) = &queue.consumer {
                let _ = consumer.send(Err(ConnectionError::delivery(message)));
            }
        }
    }

    /// End every consumer stream, as a broker-side consumer cancel would.
    pub fn cancel_consumers(&self) {
        for queue in self.lock().queues.values_mut() {
            queue.consumer = None;
        }
    }

    pub fn queue_count(&self) -> usize {
        self.lock().queues.len()
    }

    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    /// Bindings of a queue as `(exchange, pattern)` pairs.
    pub fn bindings(&self, queue: &str) -> Vec<(String, String)> {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.bindings.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn connect(&self, url: &str) -> Result<Box<dyn BrokerConnection>, ConnectionError> {
        let mut state = self.lock();
        state
            .fail_if_requested(ConnectStep::Connect)
            .map_err(ConnectionError::connect)?;

        state.next_id += 1;
        state.open_connections += 1;
        trace!(url, id = state.next_id, "Opened in-memory connection");

        Ok(Box::new(MemoryConnection {
            id: state.next_id,
            broker: self.clone(),
            closed: Mutex::new(false),
        }))
    }
}

struct MemoryConnection {
    id: u64,
    broker: MemoryBroker,
    closed: Mutex<bool>,
}

impl MemoryConnection {
    fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn create_channel(&self) -> Result<Box<dyn BrokerChannel>, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::channel("connection is closed"));
        }
        self.broker
            .lock()
            .fail_if_requested(ConnectStep::CreateChannel)
            .map_err(ConnectionError::channel)?;

        Ok(Box::new(MemoryChannel {
            connection: self.id,
            broker: self.broker.clone(),
        }))
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        {
            let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return Err(ConnectionError::close("connection already closed"));
            }
            *closed = true;
        }

        let mut state = self.broker.lock();
        state.open_connections = state.open_connections.saturating_sub(1);
        // Dropping the senders ends the consumer streams
        state.queues.retain(|_, queue| queue.owner != self.id);
        state
            .fail_if_requested(ConnectStep::Close)
            .map_err(ConnectionError::close)
    }
}

struct MemoryChannel {
    connection: u64,
    broker: MemoryBroker,
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn assert_queue(
        &self,
        name: &str,
        _options: QueueOptions,
    ) -> Result<String, ConnectionError> {
        let mut state = self.broker.lock();
        state
            .fail_if_requested(ConnectStep::AssertQueue)
            .map_err(ConnectionError::assert_queue)?;

        state.next_id += 1;
        let name = if name.is_empty() {
            format!("amq.gen-{}", state.next_id)
        } else {
            name.to_string()
        };
        state.queues.entry(name.clone()).or_insert(MemoryQueue {
            owner: self.connection,
            bindings: Vec::new(),
            consumer: None,
            next_delivery_tag: 0,
        });
        Ok(name)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), ConnectionError> {
        let mut state = self.broker.lock();
        state
            .fail_if_requested(ConnectStep::BindQueue)
            .map_err(|e| ConnectionError::bind_queue(queue, exchange, e))?;

        if !state.exchanges.contains(exchange) {
            return Err(ConnectionError::bind_queue(
                queue,
                exchange,
                format!("NOT_FOUND - no exchange '{exchange}'"),
            ));
        }
        let Some(entry) = state.queues.get_mut(queue) else {
            return Err(ConnectionError::bind_queue(
                queue,
                exchange,
                format!("NOT_FOUND - no queue '{queue}'"),
            ));
        };
        entry
            .bindings
            .push((exchange.to_string(), pattern.to_string()));
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, ConnectionError> {
        let mut state = self.broker.lock();
        state
            .fail_if_requested(ConnectStep::Consume)
            .map_err(|e| ConnectionError::consume(queue, e))?;

        let Some(entry) = state.queues.get_mut(queue) else {
            return Err(ConnectionError::consume(queue, "NOT_FOUND"));
        };
        if entry.consumer.is_some() {
            return Err(ConnectionError::consume(
                queue,
                "ACCESS_REFUSED - queue already has a consumer",
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        entry.consumer = Some(tx);

        let consumer_tag = consumer_tag.to_string();
        let stream = UnboundedReceiverStream::new(rx).map(move |result| {
            result.map(|mut delivery: Delivery| {
                delivery.delivery_info.consumer_tag = consumer_tag.clone();
                delivery
            })
        });
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matching() {
        assert!(topic_matches("#", "anything.at.all"));
        assert!(topic_matches("#", ""));
        assert!(topic_matches("orders.*", "orders.created"));
        assert!(!topic_matches("orders.*", "orders.created.eu"));
        assert!(!topic_matches("orders.*", "orders"));
        assert!(topic_matches("orders.#", "orders"));
        assert!(topic_matches("orders.#", "orders.created.eu"));
        assert!(topic_matches("*.created", "invoices.created"));
        assert!(topic_matches("a.#.z", "a.b.c.z"));
        assert!(topic_matches("a.#.z", "a.z"));
        assert!(!topic_matches("a.#.z", "a.b.c"));
        assert!(topic_matches("exact.key", "exact.key"));
        assert!(!topic_matches("exact.key", "exact.other"));
    }

    #[tokio::test]
    async fn test_publish_routes_to_bound_consumer() {
        let broker = MemoryBroker::new();
        let connection = broker.connect("memory://").await.unwrap();
        let channel = connection.create_channel().await.unwrap();
        let queue = channel
            .assert_queue("", QueueOptions::transient())
            .await
            .unwrap();
        channel
            .bind_queue(&queue, "amq.topic", "orders.*")
            .await
            .unwrap();
        let mut deliveries = channel.consume(&queue, "ctag-1").await.unwrap();

        assert_eq!(
            broker.publish("amq.topic", "orders.created", "yes", MessageProperties::default()),
            1
        );
        assert_eq!(
            broker.publish("amq.topic", "users.created", "no", MessageProperties::default()),
            0
        );

        let delivery = deliveries.next().await.unwrap().unwrap();
        assert_eq!(delivery.content, b"yes");
        assert_eq!(delivery.delivery_info.routing_key, "orders.created");
        assert_eq!(delivery.delivery_info.consumer_tag, "ctag-1");
        assert_eq!(delivery.delivery_info.delivery_tag, 1);
    }

    #[tokio::test]
    async fn test_close_removes_queues_and_ends_streams() {
        let broker = MemoryBroker::new();
        let connection = broker.connect("memory://").await.unwrap();
        let channel = connection.create_channel().await.unwrap();
        let queue = channel.assert_queue("", QueueOptions::transient()).await.unwrap();
        channel.bind_queue(&queue, "amq.topic", "#").await.unwrap();
        let mut deliveries = channel.consume(&queue, "ctag").await.unwrap();
        assert_eq!(broker.queue_count(), 1);
        assert_eq!(broker.open_connections(), 1);

        connection.close().await.unwrap();
        assert_eq!(broker.queue_count(), 0);
        assert_eq!(broker.open_connections(), 0);
        assert!(deliveries.next().await.is_none());

        assert!(connection.close().await.is_err());
    }

    #[tokio::test]
    async fn test_bind_to_unknown_exchange_fails() {
        let broker = MemoryBroker::new();
        let connection = broker.connect("memory://").await.unwrap();
        let channel = connection.create_channel().await.unwrap();
        let queue = channel.assert_queue("", QueueOptions::transient()).await.unwrap();

        let err = channel.bind_queue(&queue, "missing", "#").await.unwrap_err();
        assert_eq!(err.step(), ConnectStep::BindQueue);
        assert!(err.to_string().contains("no exchange 'missing'"));
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let broker = MemoryBroker::new();
        broker.fail_next(ConnectStep::Connect);

        let err = broker.connect("memory://").await.err().unwrap();
        assert_eq!(err.step(), ConnectStep::Connect);
        assert!(broker.connect("memory://").await.is_ok());
    }
}
