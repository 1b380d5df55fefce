//! AMQP exchange tap.
//!
//! A [`Tap`] attaches to an exchange through a private, auto-deleted queue and
//! exposes the traffic as a pull-based stream of [`Record`]s:
//!
//! ```text
//! ┌──────────┐   deliveries   ┌──────────┐   records   ┌─────────────┐   next()   ┌────────┐
//! │  Broker  │───────────────▶│ Pipeline │────────────▶│ Backpressure│───────────▶│ Reader │
//! │ (lapin)  │  push, no-ack  │ decode → │             │   adapter   │    pull    │        │
//! └──────────┘                │ select → │             └─────────────┘            └────────┘
//!                             │ format   │
//!                             └──────────┘
//! ```
//!
//! - **Decode**: content is parsed according to its content type
//!   (see [`messaging::codec`])
//! - **Select**: a [`FieldSpec`] picks values out of the message envelope
//! - **Format**: [`OutputFormat`] turns the selection into a record
//!
//! Messages that cannot be decoded are logged and skipped. Broker failures
//! are fatal: the tap moves to [`TapState::Error`] and reports a
//! [`TapEvent::Error`].

mod backpressure;
pub mod broker;
mod config;
mod connection;
mod error;
mod format;
pub mod metrics;
mod pipeline;
mod state;
mod tap;

pub use backpressure::{BackpressureAdapter, Offer};
pub use broker::{Broker, LapinBroker, MemoryBroker};
pub use config::TapConfig;
pub use connection::{BindTarget, BoundQueue, ConnectionManager};
pub use error::{ConnectStep, ConnectionError, MessageError, TapError};
pub use format::{format_record, ColorInspector, Inspector, OutputFormat, Record};
pub use state::TapState;
pub use tap::{Tap, TapEvent};

// Re-export for convenience
pub use field_selector::FieldSpec;
