//! Event sources: where mote log events come from.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use senselog_core::events::cooja;
use senselog_core::{LogEvent, StopReason, StopSignal};

use super::error::EngineError;

/// Delivers mote log events one at a time, in host order.
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the host has nothing more to deliver.
    async fn next_event(&mut self) -> Result<Option<LogEvent>, EngineError>;
}

pub type BoxedInput = Box<dyn AsyncBufRead + Unpin + Send>;

/// Reads Cooja mote output lines and parses them into events.
///
/// Malformed lines are logged and skipped.
pub struct LineSource<R> {
    reader: R,
    buffer: Vec<u8>,
    line_no: u64,
    skipped: u64,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines read so far, including skipped ones.
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl LineSource<BoxedInput> {
    /// Reads from `path`, or from stdin when no path (or `-`) is given.
    pub async fn open(path: Option<&Path>) -> Result<Self, EngineError> {
        let reader: BoxedInput = match path {
            Some(path) if path != Path::new("-") => {
                debug!("Reading mote output from {}", path.display());
                let file = tokio::fs::File::open(path).await?;
                Box::new(BufReader::new(file))
            }
            _ => {
                debug!("Reading mote output from stdin");
                Box::new(BufReader::new(tokio::io::stdin()))
            }
        };
        Ok(Self::new(reader))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for LineSource<R> {
    async fn next_event(&mut self) -> Result<Option<LogEvent>, EngineError> {
        loop {
            self.buffer.clear();
            if self.reader.read_until(b'\n', &mut self.buffer).await? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let Ok(line) = std::str::from_utf8(&self.buffer) else {
                self.skipped += 1;
                warn!("Skipping line {}: not valid UTF-8", self.line_no);
                continue;
            };

            match cooja::parse_line(line) {
                Ok(Some(event)) => return Ok(Some(event)),
                Ok(None) => continue,
                Err(e) => {
                    self.skipped += 1;
                    warn!("Skipping line {}: {e}", self.line_no);
                }
            }
        }
    }
}

/// Fixed list of events, for tests and replays.
///
/// Can raise a stop signal after a number of deliveries and can stall
/// instead of reporting end of input.
pub struct ScriptedSource {
    events: VecDeque<LogEvent>,
    delivered: usize,
    raise_after: Option<(usize, StopSignal, StopReason)>,
    stall_when_empty: bool,
}

impl ScriptedSource {
    pub fn new(events: impl IntoIterator<Item = LogEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            delivered: 0,
            raise_after: None,
            stall_when_empty: false,
        }
    }

    /// Raise `reason` on `stop` once `count` events were delivered.
    pub fn raise_after(mut self, count: usize, stop: StopSignal, reason: StopReason) -> Self {
        self.raise_after = Some((count, stop, reason));
        self
    }

    /// Never report end of input; wait forever once the list is drained.
    pub fn stall_when_empty(mut self) -> Self {
        self.stall_when_empty = true;
        self
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn next_event(&mut self) -> Result<Option<LogEvent>, EngineError> {
        let Some(event) = self.events.pop_front() else {
            if self.stall_when_empty {
                std::future::pending::<()>().await;
            }
            return Ok(None);
        };

        self.delivered += 1;
        if let Some((count, stop, reason)) = &self.raise_after {
            if self.delivered >= *count {
                stop.raise(*reason);
            }
        }
        Ok(Some(event))
    }
}
