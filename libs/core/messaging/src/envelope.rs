//! Delivery envelopes.
//!
//! A [`Delivery`] is what a broker hands to a consumer: raw content plus
//! metadata. Decoding it yields an [`Envelope`], whose JSON form is what
//! field paths address:
//!
//! ```text
//! {
//!   "content":      <decoded content>,
//!   "properties":   { "contentType": ..., "headers": {...}, ... },
//!   "deliveryInfo": { "exchange": ..., "routingKey": ..., ... }
//! }
//! ```

use crate::codec::{self, Content};
use crate::error::CodecError;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

/// AMQP basic properties attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Seconds since the epoch, as set by the publisher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// The AMQP `type` property
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
}

impl MessageProperties {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_encoding(mut self, content_encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(content_encoding.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Where and how a message was delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
}

/// A message as received from the broker, content still raw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delivery {
    pub content: Vec<u8>,
    pub properties: MessageProperties,
    pub delivery_info: DeliveryInfo,
}

impl Delivery {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_properties(mut self, properties: MessageProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_delivery_info(mut self, delivery_info: DeliveryInfo) -> Self {
        self.delivery_info = delivery_info;
        self
    }

    /// Decode the content according to the declared type and encoding.
    ///
    /// Consumes the delivery so binary payloads pass through without a copy.
    pub fn decode(self) -> Result<Envelope, CodecError> {
        let content = codec::decode(
            self.content,
            self.properties.content_type.as_deref(),
            self.properties.content_encoding.as_deref(),
        )
        .inspect_err(|err| {
            trace!(
                error = %err,
                content_type = ?self.properties.content_type,
                content_encoding = ?self.properties.content_encoding,
                routing_key = %self.delivery_info.routing_key,
                "Failed to decode content"
            )
        })?;

        Ok(Envelope {
            content,
            properties: self.properties,
            delivery_info: self.delivery_info,
        })
    }
}

/// A delivery whose content has been decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub content: Content,
    pub properties: MessageProperties,
    pub delivery_info: DeliveryInfo,
}

impl Envelope {
    /// Convert into the JSON tree that field paths are evaluated against.
    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        let mut root = Map::new();
        root.insert("content".to_string(), self.content.into_value());
        root.insert(
            "properties".to_string(),
            serde_json::to_value(self.properties)?,
        );
        root.insert(
            "deliveryInfo".to_string(),
            serde_json::to_value(self.delivery_info)?,
        );
        Ok(Value::Object(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delivery() -> Delivery {
        Delivery::new(br#"{"hello":"world!"}"#.to_vec())
            .with_properties(
                MessageProperties::default()
                    .with_content_type("application/json")
                    .with_header("x-trace", "abc"),
            )
            .with_delivery_info(DeliveryInfo {
                consumer_tag: "amqptap-1".to_string(),
                delivery_tag: 7,
                redelivered: false,
                exchange: "amq.topic".to_string(),
                routing_key: "orders.created".to_string(),
            })
    }

    #[test]
    fn test_decode_replaces_content() {
        let envelope = delivery().decode().unwrap();
        assert_eq!(envelope.content, Content::Json(json!({"hello": "world!"})));
        assert_eq!(envelope.delivery_info.delivery_tag, 7);
    }

    #[test]
    fn test_decode_error_propagates() {
        let bad = Delivery::new(b"{".to_vec())
            .with_properties(MessageProperties::default().with_content_type("text/json"));
        assert!(bad.decode().is_err());
    }

    #[test]
    fn test_into_value_shape() {
        let value = delivery().decode().unwrap().into_value().unwrap();

        assert_eq!(value["content"], json!({"hello": "world!"}));
        assert_eq!(value["properties"]["contentType"], json!("application/json"));
        assert_eq!(value["properties"]["headers"]["x-trace"], json!("abc"));
        assert_eq!(value["deliveryInfo"]["routingKey"], json!("orders.created"));
        assert_eq!(value["deliveryInfo"]["consumerTag"], json!("amqptap-1"));
        // unset properties are left out entirely
        assert!(value["properties"].get("priority").is_none());
    }

    #[test]
    fn test_type_property_name() {
        let properties = MessageProperties {
            kind: Some("order".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(properties).unwrap();
        assert_eq!(value, json!({"type": "order"}));
    }
}
