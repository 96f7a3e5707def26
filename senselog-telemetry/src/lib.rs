//! # senselog telemetry
//!
//! Logging setup, lifecycle event logging and capture counters.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
