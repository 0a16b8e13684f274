//! # Observability
//!
//! Tracing + Prometheus metrics for the log shipper.
//!
//! ## Features
//!
//! - Tracing initialization (JSON/Pretty/Compact) with extra layers, e.g. the
//!   shipper hook layer
//! - Prometheus metrics export
//! - Flush statistics
//!
//! ## Example
//!
//! ```ignore
//! let shipper = dispatcher::create_shipper(&config).await?;
//! observability::init_with_layers(
//!     ObservabilityConfig::default(),
//!     vec![shipper.layer().boxed()],
//! )?;
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

// Re-exports
pub use crate::metrics::{
    record_append_failure, record_append_success, record_event_dropped, record_event_enqueued,
    record_formatting_failure, record_pending_len, FlushStats, FlushSummary, RunningStats,
};

/// A type-erased layer that can be stacked on the registry
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize observability (Tracing + Prometheus)
///
/// - Tracing: JSON format, honours RUST_LOG
/// - Prometheus: listens on 0.0.0.0:9000
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log format
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Default log level
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// Structured JSON
    #[default]
    Json,
    /// Human readable
    Pretty,
    /// Single line
    Compact,
}

/// Initialize with a custom config
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    init_with_layers(config, Vec::new())
}

/// Initialize with a custom config and additional layers
///
/// The console layer is filtered by `RUST_LOG` (falling back to
/// `default_log_level`); every extra layer keeps its own filter, so a shipper
/// hook can forward `debug` events while the console stays at `info`.
pub fn init_with_layers(config: ObservabilityConfig, extra: Vec<BoxedLayer>) -> Result<()> {
    // 1. Initialize Tracing
    let mut layers = vec![console_layer(&config)];
    let extra_layers = extra.len();
    layers.extend(extra);

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    // 2. Initialize Prometheus Exporter (if enabled)
    if let Some(port) = config.metrics_port {
        install_prometheus(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        extra_layers,
        "Observability initialized"
    );

    Ok(())
}

fn console_layer(config: &ObservabilityConfig) -> BoxedLayer {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_filter(filter).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_filter(filter).boxed(),
    }
}

/// Initialize only the Prometheus exporter (no tracing)
///
/// For hosts that already own their tracing setup.
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(port)
}

fn install_prometheus(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, Some(9000));
        assert_eq!(config.default_log_level, "info");
    }

    #[test]
    fn test_console_layer_builds_for_every_format() {
        for log_format in [LogFormat::Json, LogFormat::Pretty, LogFormat::Compact] {
            let config = ObservabilityConfig {
                log_format,
                metrics_port: None,
                default_log_level: "debug".to_string(),
            };
            let _layer = console_layer(&config);
        }
    }
}
