//! Broker connection lifecycle for a single tap.

use crate::broker::{Broker, BrokerChannel, BrokerConnection, DeliveryStream, QueueOptions};
use crate::error::ConnectionError;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Where to attach the tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindTarget {
    pub url: String,
    pub exchange: String,
    pub route: String,
}

/// A declared, bound and consumed queue.
pub struct BoundQueue {
    pub name: String,
    pub consumer_tag: String,
    pub deliveries: DeliveryStream,
}

impl std::fmt::Debug for BoundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundQueue")
            .field("name", &self.name)
            .field("consumer_tag", &self.consumer_tag)
            .finish_non_exhaustive()
    }
}

/// Owns the broker connection and channel behind a tap.
///
/// [`open`](Self::open) runs connect, channel, queue declaration, bind and
/// consume strictly in order; the first failure stops the sequence and any
/// connection already established is closed again. [`close`](Self::close) is
/// safe to call at any time and any number of times.
pub struct ConnectionManager {
    broker: Arc<dyn Broker>,
    connection: Option<Box<dyn BrokerConnection>>,
    channel: Option<Box<dyn BrokerChannel>>,
    queue: Option<String>,
}

impl ConnectionManager {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            connection: None,
            channel: None,
            queue: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Name of the bound queue while open.
    pub fn queue_name(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    #[instrument(skip_all, fields(exchange = %target.exchange, route = %target.route))]
    pub async fn open(&mut self, target: &BindTarget) -> Result<BoundQueue, ConnectionError> {
        if self.is_open() {
            warn!("Connection already open, closing it before reconnecting");
            self.close().await?;
        }

        let connection = self.broker.connect(&target.url).await?;
        debug!("Connected to broker");

        match Self::bind(connection.as_ref(), target).await {
            Ok((channel, bound)) => {
                info!(queue = %bound.name, "Tap queue bound");
                self.connection = Some(connection);
                self.channel = Some(channel);
                self.queue = Some(bound.name.clone());
                Ok(bound)
            }
            Err(err) => {
                warn!(step = %err.step(), error = %err, "Failed to set up tap queue");
                if let Err(close_err) = connection.close().await {
                    debug!(error = %close_err, "Failed to close connection after setup error");
                }
                Err(err)
            }
        }
    }

    async fn bind(
        connection: &dyn BrokerConnection,
        target: &BindTarget,
    ) -> Result<(Box<dyn BrokerChannel>, BoundQueue), ConnectionError> {
        let channel = connection.create_channel().await?;

        let name = channel.assert_queue("", QueueOptions::transient()).await?;
        debug!(queue = %name, "Declared queue");

        channel
            .bind_queue(&name, &target.exchange, &target.route)
            .await?;

        let consumer_tag = format!("amqptap-{}", Uuid::new_v4());
        let deliveries = channel.consume(&name, &consumer_tag).await?;

        Ok((
            channel,
            BoundQueue {
                name,
                consumer_tag,
                deliveries,
            },
        ))
    }

    /// Close the connection, which also closes the channel and removes the
    /// transient queue. Does nothing when not open.
    #[instrument(skip(self), fields(queue = self.queue.as_deref().unwrap_or_default()))]
    pub async fn close(&mut self) -> Result<(), ConnectionError> {
        self.channel = None;
        self.queue = None;
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };

        connection.close().await?;
        debug!("Connection closed");
        Ok(())
    }
}
