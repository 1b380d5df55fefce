use crate::error::MessageError;
use crate::format::{format_record, Inspector, OutputFormat, Record};
use field_selector::FieldSpec;
use messaging::Delivery;
use std::sync::Arc;

/// Per-message transformation: decode, select, format.
#[derive(Clone)]
pub(crate) struct Pipeline {
    fields: FieldSpec,
    format: OutputFormat,
    inspector: Arc<dyn Inspector>,
}

impl Pipeline {
    pub(crate) fn new(fields: FieldSpec, format: OutputFormat, inspector: Arc<dyn Inspector>) -> Self {
        Self {
            fields,
            format,
            inspector,
        }
    }

    pub(crate) fn process(&self, delivery: Delivery) -> Result<Record, MessageError> {
        let mut envelope = delivery.decode()?;
        // Untyped bodies print as text in the string format
        if self.format == OutputFormat::String {
            envelope.content = envelope.content.into_text();
        }
        let document = envelope.into_value().map_err(MessageError::Envelope)?;
        let selected = self.fields.select(document);
        format_record(selected, self.format, self.inspector.as_ref()).map_err(MessageError::Format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ColorInspector;
    use messaging::{DeliveryInfo, MessageProperties};
    use serde_json::json;

    fn pipeline(fields: &str, format: OutputFormat) -> Pipeline {
        Pipeline::new(
            fields.parse().unwrap(),
            format,
            Arc::new(ColorInspector::plain()),
        )
    }

    fn json_delivery(body: &str) -> Delivery {
        Delivery::new(body.as_bytes().to_vec())
            .with_properties(MessageProperties::default().with_content_type("application/json"))
            .with_delivery_info(DeliveryInfo {
                routing_key: "orders.created".to_string(),
                exchange: "amq.topic".to_string(),
                ..Default::default()
            })
    }

    #[test]
    fn test_text_content_as_string() {
        let delivery = Delivery::new(b"Hello, World!".to_vec())
            .with_properties(MessageProperties::default().with_content_type("text/plain"));
        let record = pipeline("content", OutputFormat::String).process(delivery).unwrap();
        assert_eq!(record, Record::Text("Hello, World!".to_string()));
    }

    #[test]
    fn test_untyped_content_as_string() {
        let record = pipeline("content", OutputFormat::String)
            .process(Delivery::new(b"Hello".to_vec()))
            .unwrap();
        assert_eq!(record, Record::Text("Hello".to_string()));

        let record = pipeline("content", OutputFormat::String)
            .process(
                Delivery::new(b"Hello".to_vec()).with_properties(
                    MessageProperties::default().with_content_type("application/octet-stream"),
                ),
            )
            .unwrap();
        assert_eq!(record, Record::Text("Hello".to_string()));
    }

    #[test]
    fn test_untyped_content_as_json_keeps_bytes() {
        let record = pipeline("content", OutputFormat::Json)
            .process(Delivery::new(b"Hi".to_vec()))
            .unwrap();
        assert_eq!(record.as_text(), Some("[72,105]"));
    }

    #[test]
    fn test_json_content_as_object() {
        let record = pipeline("content", OutputFormat::Object)
            .process(json_delivery(r#"{"hello":"world!"}"#))
            .unwrap();
        assert_eq!(record, Record::Object(json!({"hello": "world!"})));
    }

    #[test]
    fn test_select_metadata_fields() {
        let record = pipeline("content.id,deliveryInfo.routingKey", OutputFormat::Json)
            .process(json_delivery(r#"{"id":7}"#))
            .unwrap();
        assert_eq!(
            record.as_text(),
            Some(r#"{"content.id":7,"deliveryInfo.routingKey":"orders.created"}"#)
        );
    }

    #[test]
    fn test_missing_path_is_absent() {
        let record = pipeline("content.nope", OutputFormat::String)
            .process(json_delivery(r#"{"id":7}"#))
            .unwrap();
        assert!(record.is_absent());
    }

    #[test]
    fn test_invalid_json_is_message_error() {
        let err = pipeline(".", OutputFormat::Json)
            .process(json_delivery("{not json"))
            .unwrap_err();
        assert_eq!(err.reason(), "invalid_json");
    }
}
