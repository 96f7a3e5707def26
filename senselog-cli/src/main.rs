//! ## senselog
//! **Cooja mote output capture**
//!
//! Waits for the trigger mote to report that sensing started, then writes
//! the captured motes' output to CSV until the input ends, the run times
//! out or Ctrl-C is pressed.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use senselog_telemetry::EventLogger;

mod commands;
mod error;

use commands::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match commands::run_command(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            EventLogger::init("info");
            error!("{e}");
            // A stdin read still blocked in the runtime would stall shutdown.
            std::process::exit(i32::from(e.exit_status()));
        }
    }
}
