//! Structured logging for the alignment engine and its drivers.
//!
//! Library code only emits `tracing` events; binaries call [`init_logging`]
//! once to install a subscriber.

pub mod config;
pub mod spans;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use config::LoggingConfig;
pub use spans::FieldSpan;

/// Build the `EnvFilter` directive string for a configuration.
///
/// `RUST_LOG`, when set, takes precedence over this in [`init_logging`].
pub fn filter_directives(config: &LoggingConfig) -> String {
    let krate = env!("CARGO_PKG_NAME").replace('-', "_");
    let mut directives = vec![format!("{}={}", krate, config.global_level)];
    for (component, level) in config.component_levels() {
        directives.push(format!("{}::{}={}", krate, component, level));
    }
    directives.join(",")
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the lifetime of the program.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(config)))?;

    let mut layers = Vec::new();
    let mut guard = None;

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(config.include_file_location)
            .with_file(config.include_file_location)
            .with_writer(std::io::stderr);
        layers.push(console_layer.boxed());
    }

    if let Some(ref log_dir) = config.log_directory {
        let file_appender = tracing_appender::rolling::daily(log_dir, "fov-align.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json();
        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::debug!(?config, "Logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_directives() {
        let mut config = LoggingConfig::default();
        config.engine_level = "trace".to_string();
        let directives = filter_directives(&config);
        assert!(directives.starts_with("fov_align=info"));
        assert!(directives.contains("fov_align::engine=trace"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_logging_config_init() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            log_directory: Some(temp_dir.path().to_path_buf()),
            ..LoggingConfig::default()
        };

        // Another test may already have installed a global subscriber.
        let _ = init_logging(&config);
    }
}
