pub mod config;
pub mod error;

pub use config::{
    ApiConfig, Config, ConfigIssue, ExportConfig, ExportFormat, PipelineConfig, ValidationResult,
};
pub use error::{ConfigError, NetworkError, ReqwestErrorExt};

/// Initialize logging for the application.
///
/// Honors `RUST_LOG`; defaults to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Onacc core initialized");
}
