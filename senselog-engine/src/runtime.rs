//! # Capture mode
//!
//! Shared entry point for frontends: wires the configured input, the stop
//! signal, the run timeout and the metrics around a `CaptureRuntime`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tracing::{info, instrument, warn};

use senselog_config::SenselogConfig;
use senselog_core::{EventLogCapturer, StopSignal};
use senselog_telemetry::{EventLogger, MetricsRecorder};

use crate::engine::{
    capture_settings, spawn_timeout, CaptureRuntime, CaptureSummary, EngineError, LineSource,
};

/// Captures mote output read from `input` (stdin when `None` or `-`).
///
/// The run timeout comes from the configuration; other stop reasons are
/// raised on `stop` by the caller.
#[instrument(level = "info", name = "run_capture_mode", skip(config, stop))]
pub async fn run_capture_mode(
    config: &SenselogConfig,
    input: Option<&Path>,
    stop: StopSignal,
) -> Result<CaptureSummary, EngineError> {
    let metrics = Arc::new(
        MetricsRecorder::new().map_err(|e| EngineError::Processing(e.to_string()))?,
    );
    let settings = capture_settings(&config.capture);
    let source = LineSource::open(input).await?;

    EventLogger::log_event(
        "capture_configured",
        vec![
            KeyValue::new("trigger_node", i64::from(settings.trigger_node.0)),
            KeyValue::new("row_format", settings.row_format.to_string()),
            KeyValue::new("timeout_ms", config.capture.timeout_ms as i64),
        ],
    )
    .await;

    let timer = spawn_timeout(
        stop.clone(),
        Duration::from_millis(config.capture.timeout_ms),
    );
    let mut runtime = CaptureRuntime::new(source, EventLogCapturer::new(settings), stop, metrics);
    let result = runtime.run().await;
    timer.abort();

    if config.telemetry.report_metrics {
        match runtime.metrics.gather_metrics() {
            Ok(text) => info!("Capture metrics:\n{text}"),
            Err(e) => warn!("Failed to gather metrics: {e}"),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use senselog_core::StopReason;
    use std::fs;

    fn config_in(dir: &Path) -> SenselogConfig {
        let mut config = SenselogConfig::default();
        config.capture.output = dir
            .join("csv/log_{run_id}{file_id}.csv")
            .to_string_lossy()
            .into_owned();
        config
    }

    #[tokio::test]
    async fn captures_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mote-output.log");
        fs::write(
            &input,
            "10\tID:1\tStarting to sense\n20\tID:1\t5,0.2,3,2,0.1,4\n30\tID:2\t1,1\n",
        )
        .unwrap();

        let summary = run_capture_mode(&config_in(dir.path()), Some(&input), StopSignal::new())
            .await
            .unwrap();
        assert_eq!(summary.reason, StopReason::EndOfInput);

        let written = fs::read_to_string(dir.path().join("csv/log_1-5-duty-cycle.csv")).unwrap();
        assert_eq!(written, "time,_Eihop,_P0,hops,d,_R,_Nb\n20,5,0.2,3,2,0.1,4\n");
    }

    #[tokio::test]
    async fn pre_raised_stop_terminates_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mote-output.log");
        fs::write(&input, "10\tID:1\tStarting to sense\n").unwrap();

        let stop = StopSignal::new();
        stop.raise(StopReason::Interrupted);
        let err = run_capture_mode(&config_in(dir.path()), Some(&input), stop)
            .await
            .unwrap_err();
        assert_eq!(err.stop_reason(), Some(StopReason::Interrupted));
        assert!(!dir.path().join("csv").exists());
    }
}
