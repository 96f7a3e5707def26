//! Capture runtime: drives an event source into the capturer until the stop
//! signal is raised.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn, Instrument};

use senselog_core::capture::{CaptureStats, DiagnosticSink, TracingDiagnostics};
use senselog_core::{
    CaptureError, EventLogCapturer, EventOutcome, LogEvent, NodeId, StopReason, StopSignal,
};
use senselog_telemetry::{EventLogger, MetricsRecorder};

use super::error::EngineError;
use super::source::EventSource;

/// Result of a run that ended because the host ran out of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub reason: StopReason,
    pub stats: CaptureStats,
    /// Closed CSV files with their data row counts.
    pub files: Vec<(NodeId, PathBuf, u64)>,
}

pub struct CaptureRuntime<S: EventSource, D: DiagnosticSink = TracingDiagnostics> {
    source: S,
    capturer: EventLogCapturer<D>,
    stop: StopSignal,
    pub metrics: Arc<MetricsRecorder>,
}

impl<S: EventSource, D: DiagnosticSink + Send> CaptureRuntime<S, D> {
    pub fn new(
        source: S,
        capturer: EventLogCapturer<D>,
        stop: StopSignal,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            source,
            capturer,
            stop,
            metrics,
        }
    }

    /// Runs until the stop signal is raised.
    ///
    /// End of input raises `EndOfInput` and yields a summary. A timeout or an
    /// interrupt closes every file and is then returned as
    /// `CaptureError::Terminated`.
    #[instrument(level = "info", name = "capture_run", skip_all)]
    pub async fn run(&mut self) -> Result<CaptureSummary, EngineError> {
        info!(
            "Waiting for '{}' from node {}",
            self.capturer.settings().start_marker,
            self.capturer.settings().trigger_node
        );

        loop {
            let next = tokio::select! {
                biased;
                reason = self.stop.raised() => {
                    debug!("Stop raised while waiting for events: {reason}");
                    None
                }
                event = self.source.next_event() => Some(event?),
            };

            match next {
                Some(Some(event)) => self.process(&event).await?,
                Some(None) => {
                    self.stop.raise(StopReason::EndOfInput);
                }
                None => {}
            }

            match self.capturer.yield_point(&self.stop) {
                Ok(()) => {}
                Err(CaptureError::Terminated(reason)) => {
                    let summary = self.summary(reason);
                    EventLogger::log_event(
                        "capture_stopped",
                        vec![
                            KeyValue::new("reason", reason.to_string()),
                            KeyValue::new("rows", summary.stats.rows as i64),
                            KeyValue::new("files", summary.files.len() as i64),
                        ],
                    )
                    .await;

                    return match reason {
                        StopReason::EndOfInput => Ok(summary),
                        _ => Err(CaptureError::Terminated(reason).into()),
                    };
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn process(&mut self, event: &LogEvent) -> Result<(), EngineError> {
        let opened_before = self.capturer.stats().sinks_opened;
        let outcome = self.capturer.on_event(event)?;
        self.metrics.events_total.inc();

        match outcome {
            EventOutcome::Gated => {}
            EventOutcome::Triggered => {
                EventLogger::log_event(
                    "capture_started",
                    vec![
                        KeyValue::new("node", i64::from(event.source.0)),
                        KeyValue::new("time", event.time as i64),
                    ],
                )
                .await;
            }
            EventOutcome::Captured => {
                self.metrics.rows_total.inc();
                if self.capturer.stats().sinks_opened > opened_before {
                    self.metrics.sinks_opened_total.inc();
                    let path = self
                        .capturer
                        .settings()
                        .output
                        .resolve(event.source)
                        .display()
                        .to_string();
                    EventLogger::log_event(
                        "sink_opened",
                        vec![
                            KeyValue::new("node", i64::from(event.source.0)),
                            KeyValue::new("path", path),
                        ],
                    )
                    .await;
                }
            }
            EventOutcome::Ignored => self.metrics.ignored_total.inc(),
        }
        Ok(())
    }

    fn summary(&self, reason: StopReason) -> CaptureSummary {
        CaptureSummary {
            reason,
            stats: self.capturer.stats(),
            files: self
                .capturer
                .closed_sinks()
                .iter()
                .map(|(node, sink)| (*node, sink.path.clone(), sink.rows))
                .collect(),
        }
    }

    pub fn capturer(&self) -> &EventLogCapturer<D> {
        &self.capturer
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Raises `Timeout` on `stop` once `timeout` has elapsed, unless the signal
/// was raised first.
pub fn spawn_timeout(stop: StopSignal, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            tokio::select! {
                _ = sleep(timeout) => {
                    if stop.raise(StopReason::Timeout) {
                        warn!("Run timeout of {}ms elapsed", timeout.as_millis());
                    }
                }
                _ = stop.raised() => {}
            }
        }
        .instrument(tracing::info_span!("timeout_task")),
    )
}

/// Raises `Interrupted` on `stop` at the first Ctrl-C.
pub fn spawn_interrupt_listener(stop: StopSignal) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        if stop.raise(StopReason::Interrupted) {
                            warn!("Interrupted, closing capture files");
                        }
                    }
                    Err(e) => warn!("Unable to listen for Ctrl-C: {e}"),
                },
                _ = stop.raised() => {}
            }
        }
        .instrument(tracing::info_span!("interrupt_task")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::source::{LineSource, ScriptedSource};
    use senselog_core::capture::{PathTemplate, RecordingDiagnostics};
    use senselog_core::{CaptureSettings, CaptureState, RowFormat};
    use std::fs;
    use std::path::Path;
    use tracing_test::traced_test;

    const HEADER: &str = "time,_Eihop,_P0,hops,d,_R,_Nb";

    fn settings(dir: &Path, row_format: RowFormat) -> CaptureSettings {
        CaptureSettings {
            row_format,
            output: PathTemplate::new(
                dir.join("csv/log_{run_id}{file_id}.csv").to_string_lossy(),
                "1-",
                "5-duty-cycle",
            ),
            ..CaptureSettings::default()
        }
    }

    fn metrics() -> Arc<MetricsRecorder> {
        Arc::new(MetricsRecorder::new().unwrap())
    }

    fn scenario() -> Vec<LogEvent> {
        vec![
            LogEvent::new(900, 2, "Starting to sense"),
            LogEvent::new(950, 1, "boot"),
            LogEvent::new(1000, 1, "Starting to sense"),
            LogEvent::new(1500, 1, "3,0.5,2,1,0.2,7"),
            LogEvent::new(1600, 2, "x"),
            LogEvent::new(2500, 1, "4,0.6,2,1,0.3,8"),
        ]
    }

    #[tokio::test]
    async fn end_of_input_returns_summary() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let metrics = metrics();
        let mut runtime = CaptureRuntime::new(
            ScriptedSource::new(scenario()),
            EventLogCapturer::with_diagnostics(
                settings(dir.path(), RowFormat::TimePrefixed),
                RecordingDiagnostics::default(),
            ),
            stop.clone(),
            metrics.clone(),
        );

        let summary = runtime.run().await.unwrap();
        assert_eq!(summary.reason, StopReason::EndOfInput);
        assert_eq!(summary.stats.rows, 2);
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.files[0].2, 2);

        let written = fs::read_to_string(&summary.files[0].1).unwrap();
        assert_eq!(
            written,
            format!("{HEADER}\n1500,3,0.5,2,1,0.2,7\n2500,4,0.6,2,1,0.3,8\n")
        );
        assert_eq!(runtime.capturer().diagnostics().lines.len(), 2);

        assert_eq!(metrics.events_total.get(), 6);
        assert_eq!(metrics.rows_total.get(), 2);
        assert_eq!(metrics.ignored_total.get(), 1);
        assert_eq!(metrics.sinks_opened_total.get(), 1);
    }

    #[tokio::test]
    async fn interrupt_flushes_and_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let source = ScriptedSource::new(scenario()).raise_after(
            4,
            stop.clone(),
            StopReason::Interrupted,
        );
        let mut runtime = CaptureRuntime::new(
            source,
            EventLogCapturer::new(settings(dir.path(), RowFormat::MessageOnly)),
            stop.clone(),
            metrics(),
        );

        let err = runtime.run().await.unwrap_err();
        assert_eq!(err.stop_reason(), Some(StopReason::Interrupted));
        assert_eq!(runtime.source().delivered(), 4);
        assert_eq!(
            runtime.capturer().state(),
            CaptureState::Terminated(StopReason::Interrupted)
        );

        let path = dir.path().join("csv/log_1-5-duty-cycle.csv");
        let written = fs::read_to_string(path).unwrap();
        assert_eq!(written, format!("{HEADER}\n3,0.5,2,1,0.2,7\n"));
    }

    #[tokio::test]
    async fn timeout_while_waiting_for_input() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let source = ScriptedSource::new(scenario().into_iter().take(4)).stall_when_empty();
        let mut runtime = CaptureRuntime::new(
            source,
            EventLogCapturer::new(settings(dir.path(), RowFormat::TimePrefixed)),
            stop.clone(),
            metrics(),
        );

        let timer = spawn_timeout(stop.clone(), Duration::from_millis(50));
        let err = runtime.run().await.unwrap_err();
        timer.await.unwrap();

        assert_eq!(err.stop_reason(), Some(StopReason::Timeout));

        let path = dir.path().join("csv/log_1-5-duty-cycle.csv");
        let written = fs::read_to_string(path).unwrap();
        assert_eq!(written, format!("{HEADER}\n1500,3,0.5,2,1,0.2,7\n"));
    }

    #[tokio::test]
    #[traced_test]
    async fn no_start_marker_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![
            LogEvent::new(1, 1, "boot"),
            LogEvent::new(2, 2, "Starting to sense"),
        ];
        let mut runtime = CaptureRuntime::new(
            ScriptedSource::new(events),
            EventLogCapturer::new(settings(dir.path(), RowFormat::TimePrefixed)),
            StopSignal::new(),
            metrics(),
        );

        let summary = runtime.run().await.unwrap();
        assert!(summary.files.is_empty());
        assert_eq!(summary.stats.events, 2);
        assert!(!dir.path().join("csv").exists());
        assert!(logs_contain("Waiting for 'Starting to sense' from node 1"));
    }

    #[tokio::test]
    async fn line_source_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input: &[u8] = b"100\tID:1\tStarting to sense\n\
not a mote line\n\
200\tID:1\t1,2,3,4,5,6\n";
        let mut runtime = CaptureRuntime::new(
            LineSource::new(input),
            EventLogCapturer::new(settings(dir.path(), RowFormat::TimePrefixed)),
            StopSignal::new(),
            metrics(),
        );

        let summary = runtime.run().await.unwrap();
        assert_eq!(runtime.source().skipped(), 1);
        let written = fs::read_to_string(&summary.files[0].1).unwrap();
        assert_eq!(written, format!("{HEADER}\n200,1,2,3,4,5,6\n"));
    }

    #[tokio::test]
    async fn timeout_task_exits_when_stop_raised_first() {
        let stop = StopSignal::new();
        let timer = spawn_timeout(stop.clone(), Duration::from_secs(3600));
        stop.raise(StopReason::EndOfInput);
        timer.await.unwrap();
        assert_eq!(stop.reason(), Some(StopReason::EndOfInput));
    }
}
