// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogFormat, LoggingConfig};

// =============================================================================
// Logging Initialization
// =============================================================================

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Configured
/// directives are added on top of either.
///
/// # Example
///
/// ```ignore
/// use uapub_config::{init_logging, LoggingConfig};
///
/// init_logging(&LoggingConfig::default())?;
/// ```
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = build_filter(config)?;

    let result = match config.format {
        LogFormat::Text => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(is_terminal),
                )
                .try_init()
        }
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Compact => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(is_terminal),
                )
                .try_init()
        }
    };

    result.map_err(|e| ConfigError::logging(e.to_string()))
}

/// Builds the filter from the environment or the configured level.
pub fn build_filter(config: &LoggingConfig) -> ConfigResult<EnvFilter> {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    for directive in config.parsed_directives()? {
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

// =============================================================================
// Log Level Parsing
// =============================================================================

/// Parses a log level string into a `Level`. Unknown values map to `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("Info"), Level::INFO);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("invalid"), Level::INFO);
    }

    #[test]
    fn test_build_filter_rejects_bad_directive() {
        let config = LoggingConfig {
            directives: vec!["uapub_opcua=verbose".into()],
            ..Default::default()
        };
        assert!(build_filter(&config).is_err());
    }

    #[test]
    fn test_second_init_fails_without_panic() {
        let config = LoggingConfig {
            format: LogFormat::Compact,
            directives: vec!["uapub_opcua=debug".into()],
            ..Default::default()
        };
        let _ = init_logging(&config);
        assert!(matches!(init_logging(&config), Err(ConfigError::Logging { .. })));
    }
}
