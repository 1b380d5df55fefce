//! Common messaging abstractions for inspecting broker traffic.
//!
//! This library provides backend-agnostic types for:
//! - **Deliveries**: the raw envelope a broker hands to a consumer
//!   (content bytes, message properties, delivery metadata)
//! - **Decoding**: turning raw content into JSON, text, or opaque bytes
//!   based on the declared content type and encoding
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌─────────────────────┐
//! │    Broker    │────▶│     Delivery     │────▶│      Envelope       │
//! │ (lapin, ...) │     │ (raw bytes+meta) │     │ (decoded content)   │
//! └──────────────┘     └──────────────────┘     └─────────────────────┘
//!                               │                          ▲
//!                               └──── codec::decode ───────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use messaging::{Content, Delivery, MessageProperties};
//!
//! let delivery = Delivery::new(b"{\"hello\":\"world!\"}".to_vec())
//!     .with_properties(MessageProperties::default().with_content_type("application/json"));
//!
//! let envelope = delivery.decode().unwrap();
//! assert!(matches!(envelope.content, Content::Json(_)));
//! ```

pub mod codec;
mod envelope;
mod error;

pub use codec::{decode, Content, Encoding, MediaType};
pub use envelope::{Delivery, DeliveryInfo, Envelope, MessageProperties};
pub use error::CodecError;
