//! End-to-end tests against a real RabbitMQ broker.
//!
//! Run with: cargo test -p amqp-tap -- --ignored

use amqp_tap::{ColorInspector, LapinBroker, OutputFormat, Record, Tap, TapConfig, TapState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{TestDataBuilder, TestRabbitMq};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn tap(rabbit: &TestRabbitMq, config: TapConfig) -> Tap {
    let config = TapConfig {
        url: rabbit.url().to_string(),
        ..config
    };
    Tap::with_inspector(
        config,
        Arc::new(LapinBroker::new()),
        Arc::new(ColorInspector::plain()),
    )
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_text_message_as_string() {
    let rabbit = TestRabbitMq::new().await;
    let tap = tap(
        &rabbit,
        TapConfig::new("")
            .with_fields("content".parse().unwrap())
            .with_format(OutputFormat::String),
    );
    tap.open().await.expect("Failed to open tap");

    rabbit
        .publish("amq.topic", "greetings", b"Hello, World!", Some("text/plain"))
        .await;

    let record = timeout(WAIT, tap.next()).await.expect("Timeout waiting for record");
    assert_eq!(record, Some(Record::Text("Hello, World!".to_string())));

    tap.close().await.unwrap();
    assert_eq!(tap.state(), TapState::Closed);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_json_message_as_object() {
    let rabbit = TestRabbitMq::new().await;
    let tap = tap(
        &rabbit,
        TapConfig::new("")
            .with_fields("content".parse().unwrap())
            .with_format(OutputFormat::Object),
    );
    tap.open().await.expect("Failed to open tap");

    rabbit
        .publish(
            "amq.topic",
            "greetings",
            br#"{"hello":"world!"}"#,
            Some("application/json"),
        )
        .await;

    let record = timeout(WAIT, tap.next()).await.expect("Timeout waiting for record");
    assert_eq!(record, Some(Record::Object(json!({"hello": "world!"}))));

    tap.close().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_route_and_custom_exchange() {
    let rabbit = TestRabbitMq::new().await;
    let builder = TestDataBuilder::from_test_name("test_route_and_custom_exchange");
    let exchange = builder.name("exchange", "orders");
    rabbit.declare_topic_exchange(&exchange).await;

    let tap = tap(
        &rabbit,
        TapConfig::new("")
            .with_exchange(exchange.clone())
            .with_route("orders.*")
            .with_fields("content,deliveryInfo.routingKey".parse().unwrap())
            .with_format(OutputFormat::Object),
    );
    tap.open().await.expect("Failed to open tap");

    rabbit
        .publish(&exchange, "users.created", b"ignored", Some("text/plain"))
        .await;
    rabbit
        .publish(&exchange, "orders.created", br#"{"id":1}"#, Some("application/json"))
        .await;

    let record = timeout(WAIT, tap.next()).await.expect("Timeout waiting for record");
    assert_eq!(
        record,
        Some(Record::Object(json!({
            "content": {"id": 1},
            "deliveryInfo.routingKey": "orders.created"
        })))
    );

    tap.close().await.unwrap();
    assert_eq!(tap.buffered(), 0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_unknown_exchange_fails_to_open() {
    let rabbit = TestRabbitMq::new().await;
    let tap = tap(&rabbit, TapConfig::new("").with_exchange("no-such-exchange"));

    let err = tap.open().await.unwrap_err();
    assert!(err.to_string().contains("no-such-exchange"));
    assert_eq!(tap.state(), TapState::Error);
    assert_eq!(timeout(WAIT, tap.next()).await.unwrap(), None);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_close_without_messages() {
    let rabbit = TestRabbitMq::new().await;
    let tap = tap(&rabbit, TapConfig::new(""));
    let mut events = tap.events();

    tap.open().await.expect("Failed to open tap");
    timeout(WAIT, tap.close()).await.unwrap().unwrap();

    assert_eq!(timeout(WAIT, tap.next()).await.unwrap(), None);
    assert!(matches!(events.recv().await, Ok(amqp_tap::TapEvent::Opened { .. })));
    assert_eq!(events.recv().await, Ok(amqp_tap::TapEvent::Closed));
}
