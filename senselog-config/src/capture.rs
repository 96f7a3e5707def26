//! Capture configuration: start condition, captured motes, CSV layout,
//! output location and the run timeout.
//!
//! Defaults reproduce the short duty-cycle run: node 1 triggers on
//! "Starting to sense", rows are time-prefixed and the run is stopped
//! after 100 s.

use serde::{Deserialize, Serialize};
use validator::{self, Validate, ValidationError, ValidationErrors};

use senselog_core::capture::{DEFAULT_HEADER, DEFAULT_START_MARKER};
use senselog_core::RowFormat;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Mote whose start marker opens the capture window.
    #[serde(default = "default_trigger_node")]
    pub trigger_node: u32,

    /// Text that marks the start of sensing.
    #[validate(length(min = 1))]
    #[serde(default = "default_start_marker")]
    pub start_marker: String,

    /// Motes whose lines are written to CSV.
    #[validate(length(min = 1))]
    #[serde(default = "default_nodes")]
    pub nodes: Vec<u32>,

    /// First line of every CSV file.
    #[validate(custom(function = validation::validate_header))]
    #[serde(default = "default_header")]
    pub header: String,

    /// Data row layout (time-prefixed or message-only).
    #[serde(default)]
    pub row_format: RowFormat,

    /// Output path template (`{run_id}`, `{file_id}`, `{node}`).
    #[validate(custom(function = validation::validate_template))]
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_run_id")]
    pub run_id: String,

    #[serde(default = "default_file_id")]
    pub file_id: String,

    /// Run timeout in milliseconds.
    #[validate(range(min = 1, max = 86_400_000))]
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_trigger_node() -> u32 {
    1
}

fn default_start_marker() -> String {
    DEFAULT_START_MARKER.into()
}

fn default_nodes() -> Vec<u32> {
    vec![1]
}

fn default_header() -> String {
    DEFAULT_HEADER.into()
}

fn default_output() -> String {
    senselog_core::capture::settings::DEFAULT_TEMPLATE.into()
}

fn default_run_id() -> String {
    "1-".into()
}

fn default_file_id() -> String {
    "5-duty-cycle".into()
}

fn default_timeout_ms() -> u64 {
    100_000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            trigger_node: default_trigger_node(),
            start_marker: default_start_marker(),
            nodes: default_nodes(),
            header: default_header(),
            row_format: RowFormat::default(),
            output: default_output(),
            run_id: default_run_id(),
            file_id: default_file_id(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CaptureConfig {
    /// Cross-field rules the derive cannot express.
    ///
    /// Several captured motes need `{node}` in the template, otherwise their
    /// sinks would all open the same file.
    pub fn validate_layout(&self) -> Result<(), ValidationErrors> {
        let mut distinct = self.nodes.clone();
        distinct.sort_unstable();
        distinct.dedup();

        if distinct.len() > 1 && !self.output.contains("{node}") {
            let mut errors = ValidationErrors::new();
            let mut error = ValidationError::new("missing_node_placeholder");
            error.message = Some("several nodes are captured but output has no {node}".into());
            errors.add("output", error);
            return Err(errors);
        }
        Ok(())
    }
}
