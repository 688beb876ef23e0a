// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Settings loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and detect the format from its extension
//! 2. Resolve `${VAR}` and `${VAR:default}` placeholders
//! 3. Parse YAML, TOML or JSON into [`EngineConfig`]
//! 4. Apply `UAPUB_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UAPUB_LOG_LEVEL=debug
//! UAPUB_LOG_FORMAT=json
//! UAPUB_MAX_ITEMS_PER_WRITER=500
//! UAPUB_QUEUE_NAME_BATCH_SIZE=200
//! UAPUB_MAX_NODES_PER_OPERATION=100
//! UAPUB_DISCARD_ERRORS=true
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{EngineConfig, LogFormat, LogLevel, OperationLimitsOverride};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loader for [`EngineConfig`].
///
/// # Examples
///
/// ```no_run
/// use uapub_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("uapub.yaml").unwrap();
/// println!("{}", config.resolver.max_items_per_writer);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether placeholders and overrides are applied.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `UAPUB` prefix.
    pub fn new() -> Self {
        Self {
            env_prefix: "UAPUB".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<EngineConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading engine configuration");

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let mut config = self.parse(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;
        self.finish(&mut config)?;

        debug!(
            level = config.logging.level.as_str(),
            max_items_per_writer = config.resolver.max_items_per_writer,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<EngineConfig> {
        let mut config = self.parse(content, format)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    fn parse(&self, content: &str, format: ConfigFormat) -> ConfigResult<EngineConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        parse_str(&content, format)
    }

    fn finish(&self, config: &mut EngineConfig) -> ConfigResult<()> {
        if self.resolve_env_vars {
            self.apply_env_overrides(config)?;
        }
        config.validate()
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut EngineConfig) -> ConfigResult<()> {
        if let Some(value) = self.var("LOG_LEVEL") {
            config.logging.level = self.parse_value("LOG_LEVEL", &value)?;
        }
        if let Some(value) = self.var("LOG_FORMAT") {
            config.logging.format = self.parse_value("LOG_FORMAT", &value)?;
        }
        if let Some(value) = self.var("MAX_ITEMS_PER_WRITER") {
            config.resolver.max_items_per_writer = self.parse_value("MAX_ITEMS_PER_WRITER", &value)?;
        }
        if let Some(value) = self.var("QUEUE_NAME_BATCH_SIZE") {
            config.resolver.queue_name_batch_size =
                self.parse_value("QUEUE_NAME_BATCH_SIZE", &value)?;
        }
        if let Some(value) = self.var("MAX_NODES_PER_OPERATION") {
            config.limits = Some(OperationLimitsOverride {
                max_nodes_per_operation: self.parse_value("MAX_NODES_PER_OPERATION", &value)?,
            });
        }
        if let Some(value) = self.var("DISCARD_ERRORS") {
            config.expansion.discard_errors = parse_bool(&value);
        }
        Ok(())
    }

    fn var(&self, suffix: &str) -> Option<String> {
        env::var(format!("{}_{}", self.env_prefix, suffix)).ok()
    }

    fn parse_value<T: FromStr>(&self, suffix: &str, value: &str) -> ConfigResult<T> {
        value.trim().parse().map_err(|_| {
            ConfigError::invalid_env_var(
                format!("{}_{}", self.env_prefix, suffix),
                format!("cannot parse '{}'", value),
            )
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(()),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

/// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
///
/// Unknown variables without a default are kept verbatim.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(var = name, "Environment variable not found");
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    result
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<EngineConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
logging:
  level: debug
  format: json
  directives:
    - "uapub_opcua::browse=trace"

resolver:
  max_items_per_writer: 250

expansion:
  create_single_writer: true
  max_depth: 4

limits:
  max_nodes_per_operation: 100
"#;

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = ConfigLoader::new().with_env_vars(false).load(file.path()).unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.directives.len(), 1);
        assert_eq!(config.resolver.max_items_per_writer, 250);
        assert_eq!(config.resolver.queue_name_batch_size, 1000);
        assert!(config.expansion.create_single_writer);
        assert_eq!(config.expansion.max_depth, Some(4));
        assert_eq!(config.resolver_settings().operation_limit_ceiling, Some(100));
    }

    #[test]
    fn test_load_toml_from_str() {
        let toml = r#"
[logging]
level = "warn"

[resolver]
queue_name_batch_size = 10
"#;
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(toml, ConfigFormat::Toml)
            .unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.resolver.queue_name_batch_size, 10);
        assert!(config.limits.is_none());
    }

    #[test]
    fn test_load_json_from_str() {
        let json = r#"{"expansion": {"discard_errors": true, "max_levels_to_expand": 2}}"#;
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        assert!(config.expansion.discard_errors);
        assert_eq!(config.expansion_request().max_levels_to_expand, 2);
    }

    #[test]
    fn test_invalid_content_is_rejected() {
        let json = r#"{"resolver": {"max_items_per_writer": 0}}"#;
        let result = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = ConfigLoader::new().load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("uapub.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("uapub.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("uapub.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("uapub")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let result = resolve_env_placeholders("level: ${UAPUB_TEST_UNSET_LEVEL:warn}");
        assert_eq!(result, "level: warn");
    }

    #[test]
    fn test_env_placeholder_without_default_is_kept() {
        let result = resolve_env_placeholders("a: ${UAPUB_TEST_UNSET_VALUE} b: ${open");
        assert_eq!(result, "a: ${UAPUB_TEST_UNSET_VALUE} b: ${open");
    }

    #[test]
    fn test_env_placeholder_resolves_set_variable() {
        env::set_var("UAPUB_TEST_PLACEHOLDER_SIZE", "42");
        let result = resolve_env_placeholders("size: ${UAPUB_TEST_PLACEHOLDER_SIZE:1}");
        assert_eq!(result, "size: 42");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("UAPUB_TEST_OVR_LOG_LEVEL", "error");
        env::set_var("UAPUB_TEST_OVR_MAX_ITEMS_PER_WRITER", "25");
        env::set_var("UAPUB_TEST_OVR_MAX_NODES_PER_OPERATION", "10");
        env::set_var("UAPUB_TEST_OVR_DISCARD_ERRORS", "yes");

        let config = ConfigLoader::new()
            .with_env_prefix("UAPUB_TEST_OVR")
            .load_from_str("{}", ConfigFormat::Json)
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Error);
        assert_eq!(config.resolver.max_items_per_writer, 25);
        assert_eq!(config.limits.map(|l| l.max_nodes_per_operation), Some(10));
        assert!(config.expansion.discard_errors);
    }

    #[test]
    fn test_invalid_env_override() {
        env::set_var("UAPUB_TEST_BAD_MAX_ITEMS_PER_WRITER", "many");
        let result = ConfigLoader::new()
            .with_env_prefix("UAPUB_TEST_BAD")
            .load_from_str("{}", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { ref name, .. }) if name == "UAPUB_TEST_BAD_MAX_ITEMS_PER_WRITER"));
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/path/uapub.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("ON"));
        assert!(!parse_bool("off"));
        assert!(!parse_bool("0"));
    }
}
