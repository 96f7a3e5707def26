mod error;
mod runtime;
mod settings;
mod source;

pub use self::{
    error::EngineError,
    runtime::{spawn_interrupt_listener, spawn_timeout, CaptureRuntime, CaptureSummary},
    settings::capture_settings,
    source::{BoxedInput, EventSource, LineSource, ScriptedSource},
};

pub mod prelude {
    pub use super::{CaptureRuntime, CaptureSummary, EngineError, EventSource};
}
