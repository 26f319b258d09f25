pub mod config;
pub mod error;

pub use config::{
    ApiConfig, CacheConfig, Config, ConfigValidationError, LocationConfig, ValidationResult,
    WidgetConfig,
};
pub use error::{AppError, CacheError, ConfigError, NetworkError, ReqwestErrorExt};

use anyhow::Result;

/// Initialize tracing/logging.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    match installed {
        Ok(()) => tracing::info!("ActNow core initialized"),
        Err(e) => tracing::debug!("Tracing subscriber already installed: {}", e),
    }
    Ok(())
}
