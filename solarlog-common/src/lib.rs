//! Solarlog Common Library
//!
//! Shared types and utilities for the solarlog datalogger:
//!
//! - [`reading`] - The normalized device reading model (`Reading`, `FieldValue`)
//! - [`backoff`] - Capped exponential backoff policy
//! - [`config`] - Configuration loading (JSON5 format) and shared schema types

pub mod backoff;
pub mod config;
pub mod reading;

// Re-export commonly used types at the crate root
pub use backoff::BackoffPolicy;
pub use config::{
    ConfigError, ConnectionConfig, DeviceConfig, LogFormat, LoggingConfig, load_config,
    parse_config,
};
pub use reading::{FieldMap, FieldValue, Reading};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| {
                    ConfigError::Validation(format!("Failed to initialize tracing: {}", e))
                })?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| {
                    ConfigError::Validation(format!("Failed to initialize tracing: {}", e))
                })?;
        }
    }

    Ok(())
}
