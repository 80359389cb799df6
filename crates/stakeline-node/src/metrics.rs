//! Prometheus metrics

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Request counters and latency histogram
pub struct Metrics {
    registry: Registry,
    operations: IntCounterVec,
    duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new("stakeline_operations_total", "Ledger operations by outcome"),
            &["operation", "outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "stakeline_request_duration_seconds",
                "Ledger operation latency",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            operations,
            duration,
        })
    }

    /// Record one finished operation
    pub fn observe(&self, operation: &str, outcome: &str, elapsed: Duration) {
        self.operations
            .with_label_values(&[operation, outcome])
            .inc();
        self.duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    /// Prometheus text exposition
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_observations() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("process_stake", "ok", Duration::from_millis(3));
        metrics.observe("process_stake", "not_found", Duration::from_millis(1));

        let text = metrics.render().unwrap();
        assert!(text.contains("stakeline_operations_total{operation=\"process_stake\",outcome=\"ok\"} 1"));
        assert!(text.contains("stakeline_request_duration_seconds_count{operation=\"process_stake\"} 2"));
    }
}
