//! Capture parameters: start condition, captured motes, CSV layout and
//! output location.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::{LogEvent, NodeId};

/// Header row written as the first line of every CSV file.
pub const DEFAULT_HEADER: &str = "time,_Eihop,_P0,hops,d,_R,_Nb";

/// Message text that opens the capture window.
pub const DEFAULT_START_MARKER: &str = "Starting to sense";

pub const DEFAULT_TEMPLATE: &str = "csv/log_{run_id}{file_id}.csv";

/// Layout of a CSV data row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowFormat {
    /// `<time>,<message>`
    #[default]
    TimePrefixed,
    /// `<message>`
    MessageOnly,
}

impl RowFormat {
    pub fn render(&self, event: &LogEvent) -> String {
        match self {
            RowFormat::TimePrefixed => format!("{},{}", event.time, event.message),
            RowFormat::MessageOnly => event.message.clone(),
        }
    }
}

impl fmt::Display for RowFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowFormat::TimePrefixed => f.write_str("time-prefixed"),
            RowFormat::MessageOnly => f.write_str("message-only"),
        }
    }
}

impl FromStr for RowFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "time-prefixed" | "time_prefixed" => Ok(RowFormat::TimePrefixed),
            "message-only" | "message_only" => Ok(RowFormat::MessageOnly),
            other => Err(format!("unknown row format '{other}'")),
        }
    }
}

/// Output path with `{run_id}`, `{file_id}` and `{node}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    pub template: String,
    pub run_id: String,
    pub file_id: String,
}

impl PathTemplate {
    pub fn new(
        template: impl Into<String>,
        run_id: impl Into<String>,
        file_id: impl Into<String>,
    ) -> Self {
        Self {
            template: template.into(),
            run_id: run_id.into(),
            file_id: file_id.into(),
        }
    }

    /// Path of the CSV file for `node`.
    pub fn resolve(&self, node: NodeId) -> PathBuf {
        PathBuf::from(
            self.template
                .replace("{run_id}", &self.run_id)
                .replace("{file_id}", &self.file_id)
                .replace("{node}", &node.to_string()),
        )
    }

    pub fn is_per_node(&self) -> bool {
        self.template.contains("{node}")
    }
}

impl Default for PathTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE, "1-", "5-duty-cycle")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Mote whose start marker opens the capture window.
    pub trigger_node: NodeId,
    pub start_marker: String,
    /// Motes whose lines are written once capturing.
    pub capture_nodes: Vec<NodeId>,
    pub header: String,
    pub row_format: RowFormat,
    pub output: PathTemplate,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            trigger_node: NodeId(1),
            start_marker: DEFAULT_START_MARKER.into(),
            capture_nodes: vec![NodeId(1)],
            header: DEFAULT_HEADER.into(),
            row_format: RowFormat::default(),
            output: PathTemplate::default(),
        }
    }
}

impl CaptureSettings {
    /// Start condition: trigger mote printed the start marker.
    #[inline]
    pub fn is_start(&self, event: &LogEvent) -> bool {
        event.source == self.trigger_node && event.message.contains(&self.start_marker)
    }

    /// Capture condition: captured mote, and not a (repeated) start marker.
    #[inline]
    pub fn is_capturable(&self, event: &LogEvent) -> bool {
        self.capture_nodes.contains(&event.source) && !event.message.contains(&self.start_marker)
    }
}
