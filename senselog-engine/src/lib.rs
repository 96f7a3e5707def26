//! # senselog engine
//!
//! Host side of a capture run: event sources, the run loop and the stop
//! triggers (timeout, Ctrl-C).

pub mod engine;
pub mod runtime;

pub use engine::{
    capture_settings, spawn_interrupt_listener, spawn_timeout, CaptureRuntime, CaptureSummary,
    EngineError, EventSource, LineSource, ScriptedSource,
};
pub use runtime::run_capture_mode;
