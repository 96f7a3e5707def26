use thiserror::Error;
use tokio::task::JoinError;

use senselog_config::ConfigError;
use senselog_core::{CaptureError, StopReason};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event processing error: {0}")]
    Processing(String),
}

impl EngineError {
    /// Stop reason if the run ended through the stop signal.
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            EngineError::Capture(err) => err.stop_reason(),
            _ => None,
        }
    }
}

impl From<JoinError> for EngineError {
    fn from(err: JoinError) -> Self {
        EngineError::Processing(err.to_string())
    }
}
