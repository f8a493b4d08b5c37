//! ## switchyard-telemetry::logging
//! **Subscriber setup and structured event records**
//!
//! `init` installs a fmt subscriber filtered by `RUST_LOG`, falling back to the
//! configured level. `log_event` emits one record per notable pool event
//! (abandoned delivery, processing timeout) inside a dedicated span.

use opentelemetry::KeyValue;
use tracing::{info_span, Instrument};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::TelemetryError;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Fails if one is already installed.
    pub fn init(default_level: &str) -> Result<(), TelemetryError> {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::NONE)
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))
    }

    #[inline]
    pub async fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "pool_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );

        async {
            tracing::info!(
                metadata = ?metadata,
                "Pool event recorded"
            );
        }
        .instrument(span)
        .await
    }
}
