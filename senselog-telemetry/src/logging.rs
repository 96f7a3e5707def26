//! ## senselog-telemetry::logging
//! **Structured logging with tracing**
//!
//! `EventLogger::init` installs the global fmt subscriber (stderr, so that
//! command output on stdout stays clean). `RUST_LOG` wins over the configured
//! default level. Lifecycle events of a capture run (start marker seen, sink
//! opened, shutdown) go through `EventLogger::log_event` with OpenTelemetry
//! key/value metadata.

use opentelemetry::KeyValue;
use tracing::{info_span, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Later calls are ignored.
    pub fn init(default_level: &str) {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .try_init();
    }

    #[inline]
    pub async fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!("capture_event", event_type = event_type, otel.kind = "INTERNAL");

        async {
            tracing::info!(metadata = ?metadata, "Capture lifecycle event");
        }
        .instrument(span)
        .await
    }
}
