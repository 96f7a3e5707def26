//! ## senselog-core::capture
//! **Event Log Capturer**
//!
//! Single-threaded state machine driven by the host, one event at a time:
//!
//! ```text
//! Idle --start marker--> Capturing --stop signal--> ShuttingDown --> Terminated
//!   \________________________stop signal_______________/
//! ```
//!
//! While `Idle` every event is discarded. The start event itself is never
//! written. While `Capturing`, each line from a captured mote that does not
//! repeat the start marker is appended to that mote's CSV file and mirrored
//! to the diagnostic sink. The host calls [`EventLogCapturer::yield_point`]
//! after every event; that is the only place a raised [`StopSignal`] is
//! observed, and it always flushes and closes every sink before reporting
//! the termination back.

pub mod diagnostics;
pub mod settings;
pub mod sink;

pub use diagnostics::{DiagnosticSink, RecordingDiagnostics, TracingDiagnostics};
pub use settings::{CaptureSettings, PathTemplate, RowFormat, DEFAULT_HEADER, DEFAULT_START_MARKER};
pub use sink::{ClosedSink, CsvSink, SinkRegistry};

use tracing::{debug, error, info};

use crate::error::CaptureError;
use crate::events::{LogEvent, NodeId};
use crate::signal::{StopReason, StopSignal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for the start marker.
    Idle,
    Capturing,
    /// Flushing and closing sinks.
    ShuttingDown(StopReason),
    Terminated(StopReason),
}

/// What the capturer did with one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// Discarded before the start marker.
    Gated,
    /// The start marker; capture begins with the next event.
    Triggered,
    /// Appended to a CSV sink.
    Captured,
    /// Not from a captured mote, or a repeated start marker.
    Ignored,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub events: u64,
    pub rows: u64,
    pub ignored: u64,
    pub sinks_opened: u64,
}

pub struct EventLogCapturer<D: DiagnosticSink = TracingDiagnostics> {
    settings: CaptureSettings,
    state: CaptureState,
    sinks: SinkRegistry,
    diagnostics: D,
    stats: CaptureStats,
    closed: Vec<(NodeId, ClosedSink)>,
}

impl EventLogCapturer<TracingDiagnostics> {
    pub fn new(settings: CaptureSettings) -> Self {
        Self::with_diagnostics(settings, TracingDiagnostics)
    }
}

impl<D: DiagnosticSink> EventLogCapturer<D> {
    pub fn with_diagnostics(settings: CaptureSettings, diagnostics: D) -> Self {
        Self {
            settings,
            state: CaptureState::Idle,
            sinks: SinkRegistry::new(),
            diagnostics,
            stats: CaptureStats::default(),
            closed: Vec::new(),
        }
    }

    /// Processes one event delivered by the host.
    pub fn on_event(&mut self, event: &LogEvent) -> Result<EventOutcome, CaptureError> {
        match self.state {
            CaptureState::Terminated(reason) | CaptureState::ShuttingDown(reason) => {
                return Err(CaptureError::Terminated(reason));
            }
            CaptureState::Idle => {
                self.stats.events += 1;
                if self.settings.is_start(event) {
                    info!(
                        "Start marker from node {} at {}, capturing",
                        event.source, event.time
                    );
                    self.state = CaptureState::Capturing;
                    return Ok(EventOutcome::Triggered);
                }
                return Ok(EventOutcome::Gated);
            }
            CaptureState::Capturing => self.stats.events += 1,
        }

        if !self.settings.is_capturable(event) {
            self.stats.ignored += 1;
            return Ok(EventOutcome::Ignored);
        }

        let row = self.settings.row_format.render(event);
        let settings = &self.settings;
        let mut opened = false;
        let sink = self.sinks.sink_for(event.source, || {
            opened = true;
            let path = settings.output.resolve(event.source);
            info!("Opening {} for node {}", path.display(), event.source);
            CsvSink::create(path, &settings.header)
        })?;
        sink.write_row(&row)?;

        if opened {
            self.stats.sinks_opened += 1;
        }
        self.stats.rows += 1;
        self.diagnostics.mirror(event.source, &row);
        Ok(EventOutcome::Captured)
    }

    /// Suspension point between two events.
    ///
    /// Returns `Ok(())` while the stop signal is clear. Once it is raised the
    /// capturer shuts down and the termination is handed back to the host.
    pub fn yield_point(&mut self, stop: &StopSignal) -> Result<(), CaptureError> {
        match stop.reason() {
            None => Ok(()),
            Some(reason) => {
                self.shutdown(reason)?;
                Err(CaptureError::Terminated(reason))
            }
        }
    }

    /// Flushes and closes every sink. A second call does nothing.
    pub fn shutdown(&mut self, reason: StopReason) -> Result<(), CaptureError> {
        if matches!(self.state, CaptureState::Terminated(_)) {
            debug!("Shutdown requested again ({reason}), already terminated");
            return Ok(());
        }

        info!("Shutting down capture: {reason}");
        self.state = CaptureState::ShuttingDown(reason);
        let result = self.sinks.close_all();
        self.state = CaptureState::Terminated(reason);

        self.closed.extend(result?);
        Ok(())
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    /// Sinks closed by `shutdown`, in node order.
    pub fn closed_sinks(&self) -> &[(NodeId, ClosedSink)] {
        &self.closed
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }
}

impl<D: DiagnosticSink> Drop for EventLogCapturer<D> {
    fn drop(&mut self) {
        if self.sinks.is_empty() {
            return;
        }
        debug!("Capturer dropped with {} open sinks", self.sinks.len());
        if let Err(e) = self.sinks.close_all() {
            error!("Failed to flush CSV sinks on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use proptest::prelude::*;

    fn settings_in(dir: &Path, row_format: RowFormat) -> CaptureSettings {
        CaptureSettings {
            row_format,
            output: PathTemplate::new(
                dir.join("log_{run_id}{file_id}.csv").to_string_lossy(),
                "1-",
                "5-duty-cycle",
            ),
            ..CaptureSettings::default()
        }
    }

    fn csv_path(dir: &Path) -> std::path::PathBuf {
        dir.join("log_1-5-duty-cycle.csv")
    }

    fn feed<D: DiagnosticSink>(
        capturer: &mut EventLogCapturer<D>,
        stop: &StopSignal,
        events: &[LogEvent],
    ) -> Result<(), CaptureError> {
        for event in events {
            capturer.on_event(event)?;
            capturer.yield_point(stop)?;
        }
        Ok(())
    }

    fn scenario() -> Vec<LogEvent> {
        vec![
            LogEvent::new(0, 1, "Starting to sense"),
            LogEvent::new(1, 1, "5,0.2,3,2,0.1,4"),
            LogEvent::new(2, 2, "ignored"),
            LogEvent::new(3, 1, "5,0.3,3,2,0.1,4"),
        ]
    }

    #[test]
    fn no_file_without_start_marker() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let mut capturer = EventLogCapturer::new(settings_in(dir.path(), RowFormat::TimePrefixed));

        let events = [
            LogEvent::new(0, 1, "booting"),
            LogEvent::new(1, 2, "Starting to sense"),
            LogEvent::new(2, 1, "5,0.2,3,2,0.1,4"),
        ];
        feed(&mut capturer, &stop, &events).unwrap();

        stop.raise(StopReason::Timeout);
        let err = capturer.yield_point(&stop).unwrap_err();
        assert_eq!(err.stop_reason(), Some(StopReason::Timeout));
        assert_eq!(capturer.state(), CaptureState::Terminated(StopReason::Timeout));
        assert!(capturer.sinks().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn time_prefixed_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let mut capturer = EventLogCapturer::with_diagnostics(
            settings_in(dir.path(), RowFormat::TimePrefixed),
            RecordingDiagnostics::default(),
        );

        feed(&mut capturer, &stop, &scenario()).unwrap();
        assert_eq!(capturer.state(), CaptureState::Capturing);

        stop.raise(StopReason::EndOfInput);
        assert!(capturer.yield_point(&stop).is_err());

        assert_eq!(
            fs::read_to_string(csv_path(dir.path())).unwrap(),
            "time,_Eihop,_P0,hops,d,_R,_Nb\n1,5,0.2,3,2,0.1,4\n3,5,0.3,3,2,0.1,4\n"
        );
        assert_eq!(
            capturer.stats(),
            CaptureStats {
                events: 4,
                rows: 2,
                ignored: 1,
                sinks_opened: 1,
            }
        );
        let mirrored: Vec<&str> = capturer
            .diagnostics()
            .lines
            .iter()
            .map(|(_, line)| line.as_str())
            .collect();
        assert_eq!(mirrored, ["1,5,0.2,3,2,0.1,4", "3,5,0.3,3,2,0.1,4"]);
    }

    #[test]
    fn message_only_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let mut capturer = EventLogCapturer::new(settings_in(dir.path(), RowFormat::MessageOnly));

        feed(&mut capturer, &stop, &scenario()).unwrap();
        capturer.shutdown(StopReason::EndOfInput).unwrap();

        assert_eq!(
            fs::read_to_string(csv_path(dir.path())).unwrap(),
            "time,_Eihop,_P0,hops,d,_R,_Nb\n5,0.2,3,2,0.1,4\n5,0.3,3,2,0.1,4\n"
        );
    }

    #[test]
    fn start_marker_is_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let mut capturer = EventLogCapturer::new(settings_in(dir.path(), RowFormat::TimePrefixed));

        let start = LogEvent::new(0, 1, "Starting to sense");
        assert_eq!(capturer.on_event(&start).unwrap(), EventOutcome::Triggered);
        // No file until a real data line arrives.
        assert!(!csv_path(dir.path()).exists());

        let repeated = LogEvent::new(5, 1, "node 1: Starting to sense again");
        assert_eq!(capturer.on_event(&repeated).unwrap(), EventOutcome::Ignored);

        let data = LogEvent::new(6, 1, "1,2,3");
        assert_eq!(capturer.on_event(&data).unwrap(), EventOutcome::Captured);
        capturer.yield_point(&stop).unwrap();
        capturer.shutdown(StopReason::Interrupted).unwrap();

        assert_eq!(
            fs::read_to_string(csv_path(dir.path())).unwrap(),
            "time,_Eihop,_P0,hops,d,_R,_Nb\n6,1,2,3\n"
        );
    }

    #[test]
    fn cancellation_flushes_captured_rows() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let mut capturer = EventLogCapturer::new(settings_in(dir.path(), RowFormat::TimePrefixed));

        capturer.on_event(&LogEvent::new(0, 1, "Starting to sense")).unwrap();
        capturer.yield_point(&stop).unwrap();
        capturer.on_event(&LogEvent::new(1, 1, "5,0.2,3,2,0.1,4")).unwrap();

        stop.raise(StopReason::Interrupted);
        let err = capturer.yield_point(&stop).unwrap_err();
        assert!(matches!(err, CaptureError::Terminated(StopReason::Interrupted)));

        // Read while the capturer is still alive: shutdown, not drop, flushed it.
        assert_eq!(
            fs::read_to_string(csv_path(dir.path())).unwrap(),
            "time,_Eihop,_P0,hops,d,_R,_Nb\n1,5,0.2,3,2,0.1,4\n"
        );
        assert_eq!(capturer.closed_sinks().len(), 1);
        assert_eq!(capturer.closed_sinks()[0].1.rows, 1);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let mut capturer = EventLogCapturer::new(settings_in(dir.path(), RowFormat::TimePrefixed));
        feed(&mut capturer, &stop, &scenario()).unwrap();

        capturer.shutdown(StopReason::Timeout).unwrap();
        capturer.shutdown(StopReason::Interrupted).unwrap();
        assert_eq!(capturer.state(), CaptureState::Terminated(StopReason::Timeout));
        assert_eq!(capturer.closed_sinks().len(), 1);

        stop.raise(StopReason::Interrupted);
        assert!(matches!(
            capturer.yield_point(&stop),
            Err(CaptureError::Terminated(StopReason::Interrupted))
        ));
    }

    #[test]
    fn events_after_termination_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut capturer = EventLogCapturer::new(settings_in(dir.path(), RowFormat::TimePrefixed));
        capturer.shutdown(StopReason::Timeout).unwrap();

        let err = capturer.on_event(&LogEvent::new(0, 1, "x")).unwrap_err();
        assert_eq!(err.stop_reason(), Some(StopReason::Timeout));
    }

    #[test]
    fn drop_flushes_open_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        {
            let mut capturer =
                EventLogCapturer::new(settings_in(dir.path(), RowFormat::TimePrefixed));
            feed(&mut capturer, &stop, &scenario()).unwrap();
        }
        let content = fs::read_to_string(csv_path(dir.path())).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn one_sink_per_captured_node() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let settings = CaptureSettings {
            capture_nodes: vec![NodeId(1), NodeId(2)],
            output: PathTemplate::new(
                dir.path().join("node{node}.csv").to_string_lossy(),
                "",
                "",
            ),
            ..CaptureSettings::default()
        };
        let mut capturer = EventLogCapturer::new(settings);

        feed(&mut capturer, &stop, &scenario()).unwrap();
        capturer.shutdown(StopReason::EndOfInput).unwrap();

        let node1 = fs::read_to_string(dir.path().join("node1.csv")).unwrap();
        let node2 = fs::read_to_string(dir.path().join("node2.csv")).unwrap();
        assert_eq!(node1.lines().count(), 3);
        assert_eq!(node2, "time,_Eihop,_P0,hops,d,_R,_Nb\n2,ignored\n");
        assert_eq!(capturer.stats().sinks_opened, 2);
    }

    #[test]
    fn open_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let settings = CaptureSettings {
            // Parent is a regular file, so the directory cannot be created.
            output: PathTemplate::new(blocker.join("out.csv").to_string_lossy(), "", ""),
            ..CaptureSettings::default()
        };
        let mut capturer = EventLogCapturer::new(settings);

        capturer.on_event(&LogEvent::new(0, 1, "Starting to sense")).unwrap();
        let err = capturer.on_event(&LogEvent::new(1, 1, "data")).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
        assert!(capturer.sinks().is_empty());
    }

    fn arb_event() -> impl Strategy<Value = (u32, bool, String)> {
        (1u32..=3, prop::bool::weighted(0.15), "[a-z0-9.,]{0,12}")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn one_row_per_qualifying_event(raw in prop::collection::vec(arb_event(), 0..40)) {
            let dir = tempfile::tempdir().unwrap();
            let stop = StopSignal::new();
            let mut capturer =
                EventLogCapturer::new(settings_in(dir.path(), RowFormat::TimePrefixed));

            let events: Vec<LogEvent> = raw
                .iter()
                .enumerate()
                .map(|(time, (node, marker, data))| {
                    let message = if *marker { format!("{data} Starting to sense") } else { data.clone() };
                    LogEvent::new(time as u64, *node, message)
                })
                .collect();

            let mut triggered = false;
            let mut expected = Vec::new();
            for event in &events {
                if !triggered {
                    triggered = event.source == NodeId(1) && event.message.contains("Starting to sense");
                } else if event.source == NodeId(1) && !event.message.contains("Starting to sense") {
                    expected.push((event.time.to_string(), event.message.clone()));
                }
            }

            feed(&mut capturer, &stop, &events).unwrap();
            capturer.shutdown(StopReason::EndOfInput).unwrap();

            let path = csv_path(dir.path());
            if expected.is_empty() {
                prop_assert!(!path.exists());
            } else {
                let content = fs::read_to_string(&path).unwrap();
                let mut lines = content.lines();
                prop_assert_eq!(lines.next(), Some(DEFAULT_HEADER));
                let rows: Vec<(String, String)> = lines
                    .map(|line| {
                        let (time, message) = line.split_once(',').unwrap();
                        (time.to_string(), message.to_string())
                    })
                    .collect();
                prop_assert_eq!(rows, expected);
            }
        }
    }
}
