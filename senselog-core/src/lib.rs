//! # senselog-core
//!
//! Capture layer for Cooja test runs: watches the log output of simulated
//! motes, waits for the start marker and appends every following line from
//! the captured motes to a per-mote CSV file until the run is stopped.
//!
//! ### Key Submodules:
//! - `events`: `LogEvent` model and the Cooja log line parser
//! - `capture`: `EventLogCapturer` state machine, CSV sinks, diagnostics mirror
//! - `signal`: cooperative `StopSignal` observed at the capturer's yield point

pub mod capture;
pub mod error;
pub mod events;
pub mod signal;

pub mod prelude {
    pub use crate::capture::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::signal::*;
}

pub use capture::{CaptureSettings, CaptureState, EventLogCapturer, EventOutcome, RowFormat};
pub use error::CaptureError;
pub use events::{LogEvent, NodeId};
pub use signal::{StopReason, StopSignal};
