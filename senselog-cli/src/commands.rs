use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use senselog_config::SenselogConfig;
use senselog_core::{RowFormat, StopSignal};
use senselog_engine::{run_capture_mode, spawn_interrupt_listener};
use senselog_telemetry::EventLogger;

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "senselog", version, about)]
pub struct Cli {
    /// Configuration file; without it config/senselog.yaml and
    /// config/<SENSELOG_ENV>.yaml are used when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture mote output into CSV once the start marker was seen
    Capture(CaptureArgs),
    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Cooja mote output log, `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

/// Command line values that take precedence over files and environment.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long)]
    pub file_id: Option<String>,

    /// Output path template ({run_id}, {file_id}, {node})
    #[arg(short, long)]
    pub output: Option<String>,

    /// Run timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Row layout: time-prefixed or message-only
    #[arg(long)]
    pub format: Option<RowFormat>,

    /// Mote to capture, repeat for several
    #[arg(long = "node")]
    pub nodes: Vec<u32>,

    /// Log the counters at the end of the run
    #[arg(long)]
    pub report_metrics: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut SenselogConfig) {
        let capture = &mut config.capture;
        if let Some(run_id) = &self.run_id {
            capture.run_id = run_id.clone();
        }
        if let Some(file_id) = &self.file_id {
            capture.file_id = file_id.clone();
        }
        if let Some(output) = &self.output {
            capture.output = output.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            capture.timeout_ms = timeout_ms;
        }
        if let Some(format) = self.format {
            capture.row_format = format;
        }
        if !self.nodes.is_empty() {
            capture.nodes = self.nodes.clone();
        }
        if self.report_metrics {
            config.telemetry.report_metrics = true;
        }
    }
}

/// Layered configuration plus command line overrides, validated again.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<SenselogConfig, CliError> {
    let mut config = SenselogConfig::resolve(path)?;
    overrides.apply(&mut config);
    config.check()?;
    Ok(config)
}

pub async fn run_command(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Capture(args) => {
            let config = load_config(cli.config.as_deref(), &args.overrides)?;
            EventLogger::init(&config.telemetry.log_level);
            run_capture(&config, &args).await
        }
        Commands::Config(args) => {
            let config = load_config(cli.config.as_deref(), &args.overrides)?;
            print!("{}", render_config(&config)?);
            Ok(())
        }
    }
}

async fn run_capture(config: &SenselogConfig, args: &CaptureArgs) -> Result<(), CliError> {
    let stop = StopSignal::new();
    let listener = spawn_interrupt_listener(stop.clone());
    let result = run_capture_mode(config, Some(&args.input), stop).await;
    listener.abort();

    let summary = result?;
    if summary.files.is_empty() {
        warn!(
            "Input ended before node {} printed '{}', nothing captured",
            config.capture.trigger_node, config.capture.start_marker
        );
    }
    for (node, path, rows) in &summary.files {
        info!("Node {node}: {rows} rows in {}", path.display());
    }
    Ok(())
}

pub fn render_config(config: &SenselogConfig) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(config)?)
}
