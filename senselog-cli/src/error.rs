use thiserror::Error;

use senselog_config::ConfigError;
use senselog_core::StopReason;
use senselog_engine::EngineError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl CliError {
    /// `124` after a run timeout, `130` after Ctrl-C, `1` otherwise.
    pub fn exit_status(&self) -> u8 {
        let reason = match self {
            CliError::Engine(err) => err.stop_reason(),
            _ => None,
        };
        match reason {
            Some(StopReason::Timeout) => 124,
            Some(StopReason::Interrupted) => 130,
            _ => 1,
        }
    }
}
