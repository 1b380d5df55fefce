//! Prometheus metrics for taps
//!
//! Recording is always on; nothing is exported until [`init_metrics`] installs
//! a recorder.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing::info;

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus recorder and serve `/metrics` on `listen`.
///
/// Only the first call installs anything; later calls return the address
/// already in use.
pub fn init_metrics(listen: SocketAddr) -> Result<SocketAddr, BuildError> {
    EXPORTER
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .with_http_listener(listen)
                .install()?;
            info!(%listen, "Prometheus exporter listening");
            Ok(listen)
        })
        .copied()
}

/// Tap metrics helper
#[derive(Debug, Clone)]
pub struct TapMetrics {
    exchange: String,
}

impl TapMetrics {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
        }
    }

    pub fn message_received(&self) {
        counter!(
            "amqp_tap_messages_received_total",
            "exchange" => self.exchange.clone()
        )
        .increment(1);
    }

    pub fn record_emitted(&self) {
        counter!(
            "amqp_tap_records_emitted_total",
            "exchange" => self.exchange.clone()
        )
        .increment(1);
    }

    /// A message that could not be turned into a record
    pub fn message_dropped(&self, reason: &'static str) {
        counter!(
            "amqp_tap_messages_dropped_total",
            "exchange" => self.exchange.clone(),
            "reason" => reason
        )
        .increment(1);
    }

    pub fn backpressure_paused(&self) {
        counter!(
            "amqp_tap_backpressure_pauses_total",
            "exchange" => self.exchange.clone()
        )
        .increment(1);
    }

    pub fn set_buffered(&self, buffered: usize) {
        gauge!(
            "amqp_tap_buffered_records",
            "exchange" => self.exchange.clone()
        )
        .set(buffered as f64);
    }
}
