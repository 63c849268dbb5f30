use std::sync::LazyLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Abstracts away the metrics backend so a connector never links against
/// `metrics` directly. The default implementation below is backed by the
/// `metrics`/`metrics-exporter-prometheus` crates already used elsewhere in
/// this workspace; a consumer embedding the runtime in a system with its
/// own telemetry stack can swap this trait out without touching connectors.
pub trait Telemetry: Send + Sync {
    fn counter(&self, name: &'static str, labels: &[(&'static str, String)], value: u64);
    fn gauge(&self, name: &'static str, labels: &[(&'static str, String)], value: f64);
}

pub static METRICS: LazyLock<PrometheusTelemetry> = LazyLock::new(|| {
    describe_gauge!("provider_price", "Latest observed price for a provider/pair");
    describe_gauge!("provider_volume", "Latest observed 24h volume for a provider/pair");
    describe_counter!("provider_message", "Classified inbound websocket frames");
    describe_counter!("provider_poll_errors_total", "Total polling cycle errors");

    PrometheusTelemetry
});

pub struct PrometheusTelemetry;

impl Telemetry for PrometheusTelemetry {
    fn counter(&self, name: &'static str, labels: &[(&'static str, String)], value: u64) {
        let owned: Vec<(&'static str, String)> = labels.to_vec();
        counter!(name, &owned).increment(value);
    }

    fn gauge(&self, name: &'static str, labels: &[(&'static str, String)], value: f64) {
        let owned: Vec<(&'static str, String)> = labels.to_vec();
        gauge!(name, &owned).set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_and_gauge_calls_do_not_panic() {
        METRICS.counter("provider_message", &[("provider", "binance".to_owned()), ("type", "text".to_owned())], 1);
        METRICS.gauge("provider_price", &[("provider", "binance".to_owned()), ("pair", "BTCUSDT".to_owned())], 42.0);
    }
}
