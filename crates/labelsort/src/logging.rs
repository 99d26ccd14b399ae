//! Process-wide tracing setup. `RUST_LOG` overrides the configured level.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LogFormat;
use crate::error::LabelsortError;

/// Maps a configured level name to a tracing level, case-insensitively.
/// `WARNING` and `CRITICAL` are accepted as aliases.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "critical" => Some(Level::ERROR),
        _ => None,
    }
}

fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()))
}

/// Installs the global subscriber and bridges `log` records into it.
pub fn init(level_name: &str, format: LogFormat) -> Result<(), LabelsortError> {
    let level = parse_level(level_name)
        .ok_or_else(|| LabelsortError::Logging(format!("unknown log level '{}'", level_name)))?;

    tracing_log::LogTracer::init().map_err(|e| LabelsortError::Logging(e.to_string()))?;

    let filter = build_filter(level);
    let result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_target(false)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            Registry::default().with(filter).with(fmt::layer().json()),
        ),
    };

    result.map_err(|e| LabelsortError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_names() {
        assert_eq!(parse_level("INFO"), Some(Level::INFO));
        assert_eq!(parse_level("Warning"), Some(Level::WARN));
        assert_eq!(parse_level("critical"), Some(Level::ERROR));
        assert_eq!(parse_level(" debug "), Some(Level::DEBUG));
        assert_eq!(parse_level("verbose"), None);
    }
}
