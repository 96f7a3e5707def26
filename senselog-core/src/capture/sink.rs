//! Buffered CSV sinks keyed by mote.
//!
//! A sink is opened lazily on the first captured line of its mote, written
//! to repeatedly and closed exactly once when the registry is drained at
//! shutdown. Writes go through a `BufWriter`; nothing reaches disk reliably
//! until `close_all` (or drop) flushes it.

use std::collections::btree_map::{BTreeMap, Entry};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::events::NodeId;

/// One open CSV output file.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl CsvSink {
    /// Creates (truncating) the file at `path` and writes `header` as its
    /// first line. Missing parent directories are created.
    pub fn create(path: impl Into<PathBuf>, header: &str) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{header}")?;
        debug!("Opened CSV sink {}", path.display());

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    pub fn write_row(&mut self, row: &str) -> io::Result<()> {
        writeln!(self.writer, "{row}")?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flushes buffered rows and closes the file.
    pub fn close(mut self) -> io::Result<ClosedSink> {
        self.writer.flush()?;
        Ok(ClosedSink {
            path: self.path,
            rows: self.rows,
        })
    }
}

/// What remains of a sink after it was flushed and closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosedSink {
    pub path: PathBuf,
    pub rows: u64,
}

/// Open sinks, at most one per mote.
#[derive(Debug, Default)]
pub struct SinkRegistry {
    sinks: BTreeMap<NodeId, CsvSink>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sink of `node`, opening it with `open` if there is none yet.
    pub fn sink_for<F>(&mut self, node: NodeId, open: F) -> io::Result<&mut CsvSink>
    where
        F: FnOnce() -> io::Result<CsvSink>,
    {
        match self.sinks.entry(node) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(open()?)),
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.sinks.contains_key(&node)
    }

    pub fn get(&self, node: NodeId) -> Option<&CsvSink> {
        self.sinks.get(&node)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Flushes and closes every sink, leaving the registry empty.
    ///
    /// All sinks are closed even if one of them fails to flush; the first
    /// error is returned. Calling this on an empty registry is a no-op.
    pub fn close_all(&mut self) -> io::Result<Vec<(NodeId, ClosedSink)>> {
        let mut closed = Vec::with_capacity(self.sinks.len());
        let mut first_error = None;

        for (node, sink) in std::mem::take(&mut self.sinks) {
            let path = sink.path().to_path_buf();
            match sink.close() {
                Ok(done) => {
                    debug!("Closed CSV sink {} ({} rows)", done.path.display(), done.rows);
                    closed.push((node, done));
                }
                Err(e) => {
                    warn!("Failed to flush CSV sink {}: {e}", path.display());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(closed),
        }
    }
}
