use thiserror::Error;

use crate::events::cooja::ParseError;
use crate::signal::StopReason;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Raised by the host at the yield point; sinks are already closed.
    #[error("Capture terminated: {0}")]
    Terminated(StopReason),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log parse error: {0}")]
    Parse(#[from] ParseError),
}

impl CaptureError {
    /// Returns the stop reason if this is a host-issued termination.
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            CaptureError::Terminated(reason) => Some(*reason),
            _ => None,
        }
    }
}
