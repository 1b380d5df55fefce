//! Error types for the tap.
//!
//! Two families that never mix:
//! - **Fatal** ([`ConnectionError`], wrapped in [`TapError`]): the broker
//!   connection is unusable; the tap moves to its error state.
//! - **Per-message** ([`MessageError`]): one delivery could not be turned into
//!   a record; it is logged and skipped.

use crate::state::TapState;
use messaging::CodecError;
use strum::Display;
use thiserror::Error;

/// The broker interaction that was in progress when a [`ConnectionError`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectStep {
    Connect,
    CreateChannel,
    AssertQueue,
    BindQueue,
    Consume,
    Deliver,
    Close,
}

/// Broker-level failure. Always fatal to the tap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("failed to open channel: {0}")]
    Channel(String),

    #[error("failed to declare queue: {0}")]
    AssertQueue(String),

    #[error("failed to bind queue '{queue}' to exchange '{exchange}': {message}")]
    BindQueue {
        queue: String,
        exchange: String,
        message: String,
    },

    #[error("failed to start consumer on queue '{queue}': {message}")]
    Consume { queue: String, message: String },

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("consumer was cancelled by the broker")]
    ConsumerCancelled,

    #[error("failed to close connection: {0}")]
    Close(String),
}

impl ConnectionError {
    /// Which step failed.
    pub fn step(&self) -> ConnectStep {
        match self {
            ConnectionError::Connect(_) => ConnectStep::Connect,
            ConnectionError::Channel(_) => ConnectStep::CreateChannel,
            ConnectionError::AssertQueue(_) => ConnectStep::AssertQueue,
            ConnectionError::BindQueue { .. } => ConnectStep::BindQueue,
            ConnectionError::Consume { .. } => ConnectStep::Consume,
            ConnectionError::Delivery(_) | ConnectionError::ConsumerCancelled => {
                ConnectStep::Deliver
            }
            ConnectionError::Close(_) => ConnectStep::Close,
        }
    }

    pub fn connect(error: impl std::fmt::Display) -> Self {
        Self::Connect(error.to_string())
    }

    pub fn channel(error: impl std::fmt::Display) -> Self {
        Self::Channel(error.to_string())
    }

    pub fn assert_queue(error: impl std::fmt::Display) -> Self {
        Self::AssertQueue(error.to_string())
    }

    pub fn bind_queue(queue: &str, exchange: &str, error: impl std::fmt::Display) -> Self {
        Self::BindQueue {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            message: error.to_string(),
        }
    }

    pub fn consume(queue: &str, error: impl std::fmt::Display) -> Self {
        Self::Consume {
            queue: queue.to_string(),
            message: error.to_string(),
        }
    }

    pub fn delivery(error: impl std::fmt::Display) -> Self {
        Self::Delivery(error.to_string())
    }

    pub fn close(error: impl std::fmt::Display) -> Self {
        Self::Close(error.to_string())
    }
}

/// Error returned by [`Tap`](crate::Tap) operations and broadcast on its event channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TapError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("cannot {operation} a tap that is {state}")]
    InvalidState {
        operation: &'static str,
        state: TapState,
    },
}

/// Why a single delivery was dropped.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("could not decode content: {0}")]
    Decode(#[from] CodecError),

    #[error("could not build envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("could not format record: {0}")]
    Format(#[source] serde_json::Error),
}

impl MessageError {
    /// Short label for log fields and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            MessageError::Decode(e) => e.kind(),
            MessageError::Envelope(_) => "envelope",
            MessageError::Format(_) => "format",
        }
    }
}
