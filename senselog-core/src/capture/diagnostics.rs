//! Mirror of every captured line to a diagnostic log.

use tracing::info;

use crate::events::NodeId;

/// Receives a copy of each row written to a CSV sink.
pub trait DiagnosticSink {
    fn mirror(&mut self, source: NodeId, line: &str);
}

/// Emits captured lines as INFO `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn mirror(&mut self, source: NodeId, line: &str) {
        info!(node = %source, "{line}");
    }
}

/// Keeps captured lines in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingDiagnostics {
    pub lines: Vec<(NodeId, String)>,
}

impl DiagnosticSink for RecordingDiagnostics {
    fn mirror(&mut self, source: NodeId, line: &str) {
        self.lines.push((source, line.to_string()));
    }
}

impl<D: DiagnosticSink + ?Sized> DiagnosticSink for &mut D {
    fn mirror(&mut self, source: NodeId, line: &str) {
        (**self).mirror(source, line)
    }
}
