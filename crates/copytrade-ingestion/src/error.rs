//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(#[from] copytrade_registry::RegistryError),

    #[error("Bus error: {0}")]
    Bus(#[from] copytrade_bus::BusError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] copytrade_telemetry::TelemetryError),
}

impl AppError {
    /// Whether the error should end the process with a non-zero exit.
    ///
    /// Telemetry errors only affect the metrics exporter and are logged.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Telemetry(_))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
