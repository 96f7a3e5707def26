//! ## senselog-telemetry::metrics
//! **Prometheus counters for a capture run**

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub events_total: IntCounter,
    pub rows_total: IntCounter,
    pub ignored_total: IntCounter,
    pub sinks_opened_total: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_total =
            IntCounter::new("senselog_events_total", "Mote log events delivered by the host")?;
        let rows_total = IntCounter::new("senselog_rows_total", "CSV data rows written")?;
        let ignored_total = IntCounter::new(
            "senselog_ignored_total",
            "Events seen while capturing that produced no row",
        )?;
        let sinks_opened_total =
            IntCounter::new("senselog_sinks_opened_total", "CSV files opened")?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(rows_total.clone()))?;
        registry.register(Box::new(ignored_total.clone()))?;
        registry.register(Box::new(sinks_opened_total.clone()))?;

        Ok(Self {
            registry,
            events_total,
            rows_total,
            ignored_total,
            sinks_opened_total,
        })
    }

    /// Text exposition of every registered counter.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
