// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Engine settings schema.
//!
//! ```text
//! EngineConfig
//! ├── logging: LoggingConfig
//! ├── resolver: ResolverSettings
//! ├── expansion: ExpansionDefaults
//! └── limits: Option<OperationLimitsOverride>
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::Directive;
use uapub_opcua::models::PublishedNodeExpansionModel;
use uapub_opcua::ResolverSettings;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// EngineConfig
// =============================================================================

/// Root settings of the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Resolver tuning.
    pub resolver: ResolverSettings,

    /// Defaults applied to expansion requests.
    pub expansion: ExpansionDefaults,

    /// Local ceiling on server-advertised batch sizes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<OperationLimitsOverride>,
}

impl EngineConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.logging.validate()?;

        if self.resolver.max_items_per_writer == 0 {
            return Err(ConfigError::validation(
                "resolver.max_items_per_writer",
                "must be greater than zero",
            ));
        }
        if self.resolver.queue_name_batch_size == 0 {
            return Err(ConfigError::validation(
                "resolver.queue_name_batch_size",
                "must be greater than zero",
            ));
        }
        if let Some(limits) = &self.limits {
            limits.validate()?;
        }
        Ok(())
    }

    /// Resolver settings with the limits override applied.
    pub fn resolver_settings(&self) -> ResolverSettings {
        let mut settings = self.resolver.clone();
        if let Some(limits) = &self.limits {
            settings.operation_limit_ceiling = Some(limits.max_nodes_per_operation);
        }
        settings
    }

    /// Expansion request built from the configured defaults.
    pub fn expansion_request(&self) -> PublishedNodeExpansionModel {
        self.expansion.to_request()
    }
}

// =============================================================================
// ExpansionDefaults
// =============================================================================

/// Default options for configuration expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionDefaults {
    /// Drop entries that carry errors.
    pub discard_errors: bool,
    /// Emit one writer for all discovered variables.
    pub create_single_writer: bool,
    /// Also publish methods of expanded objects.
    pub include_methods: bool,
    /// Treat nested objects of an instance as the instance.
    pub flatten_type_instance: bool,
    /// Skip the configured node when it is an instance.
    pub exclude_root_if_instance_node: bool,
    /// Match the exact type only.
    pub no_subtypes: bool,
    /// Maximum discovery depth.
    pub max_depth: Option<u32>,
    /// Levels of variables below an object or variable.
    pub max_levels_to_expand: u32,
}

impl ExpansionDefaults {
    /// Converts the defaults into an expansion request.
    pub fn to_request(&self) -> PublishedNodeExpansionModel {
        PublishedNodeExpansionModel {
            discard_errors: self.discard_errors,
            create_single_writer: self.create_single_writer,
            include_methods: self.include_methods,
            flatten_type_instance: self.flatten_type_instance,
            exclude_root_if_instance_node: self.exclude_root_if_instance_node,
            no_subtypes: self.no_subtypes,
            max_depth: self.max_depth,
            max_levels_to_expand: self.max_levels_to_expand,
        }
    }
}

// =============================================================================
// OperationLimitsOverride
// =============================================================================

/// Clamp for browse, read and translate batch sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLimitsOverride {
    /// Maximum nodes sent in one service call.
    pub max_nodes_per_operation: u32,
}

impl OperationLimitsOverride {
    /// Validates the override.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_nodes_per_operation == 0 {
            return Err(ConfigError::validation(
                "limits.max_nodes_per_operation",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level.
    pub level: LogLevel,

    /// Output format.
    pub format: LogFormat,

    /// Per-target filter directives such as `uapub_opcua::browse=trace`.
    pub directives: Vec<String>,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.parsed_directives().map(|_| ())
    }

    /// Parses the filter directives.
    pub fn parsed_directives(&self) -> ConfigResult<Vec<Directive>> {
        self.directives
            .iter()
            .map(|d| {
                d.parse::<Directive>().map_err(|e| {
                    ConfigError::validation("logging.directives", format!("'{}': {}", d, e))
                })
            })
            .collect()
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// JSON for log aggregation.
    Json,
    /// Minimal single-line output.
    Compact,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolver.max_items_per_writer, 1000);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_zero_items_per_writer_is_rejected() {
        let mut config = EngineConfig::default();
        config.resolver.max_items_per_writer = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "resolver.max_items_per_writer"));
    }

    #[test]
    fn test_limits_override_sets_ceiling() {
        let config = EngineConfig {
            limits: Some(OperationLimitsOverride {
                max_nodes_per_operation: 50,
            }),
            ..Default::default()
        };
        assert_eq!(config.resolver_settings().operation_limit_ceiling, Some(50));
        assert_eq!(EngineConfig::default().resolver_settings().operation_limit_ceiling, None);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let config = EngineConfig {
            limits: Some(OperationLimitsOverride {
                max_nodes_per_operation: 0,
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expansion_request_copies_defaults() {
        let mut config = EngineConfig::default();
        config.expansion.create_single_writer = true;
        config.expansion.max_depth = Some(3);

        let request = config.expansion_request();
        assert!(request.create_single_writer);
        assert_eq!(request.max_depth, Some(3));
        assert!(!request.discard_errors);
    }

    #[test]
    fn test_directives_are_validated() {
        let mut logging = LoggingConfig {
            directives: vec!["uapub_opcua::browse=trace".into()],
            ..Default::default()
        };
        assert_eq!(logging.parsed_directives().unwrap().len(), 1);

        logging.directives.push("uapub_opcua=verbose".into());
        assert!(logging.validate().is_err());
    }

    #[test]
    fn test_log_level_as_str() {
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogLevel::Error.as_str(), "error");
    }
}
