use thiserror::Error;

use switchyard_config::ConfigError;
use switchyard_listener::ListenerError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Failed to render report: {0}")]
    Render(#[from] serde_json::Error),

    #[error(transparent)]
    Telemetry(#[from] switchyard_telemetry::TelemetryError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
