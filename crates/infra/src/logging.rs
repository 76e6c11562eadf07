//! Tracing subscriber initialisation
//!
//! One global subscriber per process: an `EnvFilter`, a console layer in the
//! configured format, and an optional daily rolling file layer.

use faultline_domain::{FaultlineError, LogFormat, LoggingConfig, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Highest-priority filter variable; `RUST_LOG` is consulted next
pub const FILTER_ENV: &str = "FAULTLINE_LOG";

/// File name prefix for daily log files
const LOG_FILE_PREFIX: &str = "faultline.log";

/// Install the global tracing subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process. It is `None` when no `log_dir` is configured.
///
/// # Errors
/// Returns `FaultlineError::Config` if the filter directive is invalid or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    let json = config.format == LogFormat::Json;
    let console_pretty = (!json).then(|| fmt::layer().with_target(true));
    let console_json = json.then(|| fmt::layer().json().with_current_span(true));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_pretty)
        .with(console_json)
        .with(file_layer)
        .try_init()
        .map_err(|e| FaultlineError::Config(format!("Failed to install tracing subscriber: {e}")))?;

    tracing::debug!(format = %config.format, log_dir = ?config.log_dir, "Tracing initialised");
    Ok(guard)
}

/// `FAULTLINE_LOG`, then `RUST_LOG`, then the configured directive
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directive = [FILTER_ENV, EnvFilter::DEFAULT_ENV]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| config.filter.clone());

    EnvFilter::try_new(&directive)
        .map_err(|e| FaultlineError::Config(format!("Invalid log filter '{directive}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_config_error() {
        if std::env::var(FILTER_ENV).is_ok() || std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        let config = LoggingConfig { filter: "faultline=loud".into(), ..Default::default() };
        assert!(matches!(build_filter(&config), Err(FaultlineError::Config(_))));
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
