//! ## senselog-core::events
//! **Mote log events delivered by the simulation host**
//!
//! A `LogEvent` is one line of mote output: the simulation time it was
//! printed at, the mote that printed it, and the raw text. Events are
//! transient; the capturer never keeps them past the current step.

pub mod cooja;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a simulated mote (Cooja `ID:<n>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// One line of mote output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    /// Simulation clock value as reported by the host.
    pub time: u64,

    /// Mote that emitted the line.
    pub source: NodeId,

    /// Raw message text, without the trailing newline.
    pub message: String,
}

impl LogEvent {
    #[inline]
    pub fn new(time: u64, source: impl Into<NodeId>, message: impl Into<String>) -> Self {
        Self {
            time,
            source: source.into(),
            message: message.into(),
        }
    }
}
