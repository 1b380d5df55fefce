//! RabbitMQ (AMQP 0-9-1) broker backed by lapin.

use super::{Broker, BrokerChannel, BrokerConnection, DeliveryStream, QueueOptions};
use crate::error::ConnectionError;
use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{BasicConsumeOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use messaging::{Delivery, DeliveryInfo, MessageProperties};
use serde_json::{Map, Value};
use tracing::debug;

const CONNECTION_NAME: &str = "amqptap";

/// Connects to a real broker over AMQP 0-9-1.
#[derive(Debug, Clone, Default)]
pub struct LapinBroker {
    connection_name: Option<String>,
}

impl LapinBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name shown for the connection in the broker's management UI.
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }
}

#[async_trait]
impl Broker for LapinBroker {
    async fn connect(&self, url: &str) -> Result<Box<dyn BrokerConnection>, ConnectionError> {
        let name = self.connection_name.as_deref().unwrap_or(CONNECTION_NAME);
        let properties = ConnectionProperties::default().with_connection_name(name.into());

        let connection = Connection::connect(url, properties)
            .await
            .map_err(ConnectionError::connect)?;

        Ok(Box::new(LapinConnection { connection }))
    }
}

struct LapinConnection {
    connection: Connection,
}

#[async_trait]
impl BrokerConnection for LapinConnection {
    async fn create_channel(&self) -> Result<Box<dyn BrokerChannel>, ConnectionError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(ConnectionError::channel)?;
        Ok(Box::new(LapinChannel { channel }))
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        if !self.connection.status().connected() {
            debug!("Connection already closed by the broker");
            return Ok(());
        }
        self.connection
            .close(200, "OK")
            .await
            .map_err(ConnectionError::close)
    }
}

struct LapinChannel {
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    async fn assert_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, ConnectionError> {
        let queue = self
            .channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    exclusive: options.exclusive,
                    durable: options.durable,
                    auto_delete: options.auto_delete,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(ConnectionError::assert_queue)?;

        Ok(queue.name().as_str().to_string())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), ConnectionError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| ConnectionError::bind_queue(queue, exchange, e))
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, ConnectionError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ConnectionError::consume(queue, e))?;

        let consumer_tag = consumer_tag.to_string();
        let deliveries = consumer.map(move |result| {
            result
                .map(|delivery| to_delivery(delivery, &consumer_tag))
                .map_err(ConnectionError::delivery)
        });

        Ok(deliveries.boxed())
    }
}

fn to_delivery(delivery: lapin::message::Delivery, consumer_tag: &str) -> Delivery {
    Delivery {
        properties: to_properties(&delivery.properties),
        delivery_info: DeliveryInfo {
            consumer_tag: consumer_tag.to_string(),
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            exchange: delivery.exchange.as_str().to_string(),
            routing_key: delivery.routing_key.as_str().to_string(),
        },
        content: delivery.data,
    }
}

fn to_properties(properties: &BasicProperties) -> MessageProperties {
    let text = |value: &Option<ShortString>| value.as_ref().map(|s| s.as_str().to_string());

    MessageProperties {
        content_type: text(properties.content_type()),
        content_encoding: text(properties.content_encoding()),
        headers: properties
            .headers()
            .as_ref()
            .map(field_table_to_map)
            .unwrap_or_default(),
        delivery_mode: *properties.delivery_mode(),
        priority: *properties.priority(),
        correlation_id: text(properties.correlation_id()),
        reply_to: text(properties.reply_to()),
        expiration: text(properties.expiration()),
        message_id: text(properties.message_id()),
        timestamp: *properties.timestamp(),
        kind: text(properties.kind()),
        user_id: text(properties.user_id()),
        app_id: text(properties.app_id()),
        cluster_id: text(properties.cluster_id()),
    }
}

fn field_table_to_map(table: &FieldTable) -> Map<String, Value> {
    table
        .inner()
        .iter()
        .map(|(key, value)| (key.as_str().to_string(), amqp_to_json(value)))
        .collect()
}

fn amqp_to_json(value: &AMQPValue) -> Value {
    match value {
        AMQPValue::Boolean(b) => Value::Bool(*b),
        AMQPValue::ShortShortInt(n) => Value::from(*n),
        AMQPValue::ShortShortUInt(n) => Value::from(*n),
        AMQPValue::ShortInt(n) => Value::from(*n),
        AMQPValue::ShortUInt(n) => Value::from(*n),
        AMQPValue::LongInt(n) => Value::from(*n),
        AMQPValue::LongUInt(n) => Value::from(*n),
        AMQPValue::LongLongInt(n) => Value::from(*n),
        AMQPValue::Float(n) => Value::from(f64::from(*n)),
        AMQPValue::Double(n) => Value::from(*n),
        AMQPValue::DecimalValue(d) => {
            Value::from(f64::from(d.value) / 10f64.powi(i32::from(d.scale)))
        }
        AMQPValue::ShortString(s) => Value::String(s.as_str().to_string()),
        AMQPValue::LongString(s) => {
            Value::String(String::from_utf8_lossy(s.as_bytes()).into_owned())
        }
        AMQPValue::FieldArray(items) => {
            Value::Array(items.as_slice().iter().map(amqp_to_json).collect())
        }
        AMQPValue::Timestamp(t) => Value::from(*t),
        AMQPValue::FieldTable(table) => Value::Object(field_table_to_map(table)),
        AMQPValue::ByteArray(bytes) => {
            Value::Array(bytes.as_slice().iter().copied().map(Value::from).collect())
        }
        AMQPValue::Void => Value::Null,
    }
}
