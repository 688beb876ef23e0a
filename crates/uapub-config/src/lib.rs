// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uapub-config
//!
//! Settings for the uapub engine.
//!
//! ## Features
//!
//! - **Schema**: logging, resolver tuning, expansion defaults and batch limits
//! - **Multi-Format Support**: YAML, TOML and JSON files
//! - **Environment Overrides**: `UAPUB_*` variables and `${VAR:default}` placeholders
//! - **Logging**: `tracing` subscriber setup in text, JSON or compact form
//!
//! ## Quick Start
//!
//! ```no_run
//! use uapub_config::{init_logging, load_config};
//!
//! let config = load_config("uapub.yaml").unwrap();
//! init_logging(&config.logging).unwrap();
//!
//! let settings = config.resolver_settings();
//! let request = config.expansion_request();
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! logging:
//!   level: info
//!   format: json
//!   directives:
//!     - "uapub_opcua::resolver=debug"
//! resolver:
//!   max_items_per_writer: 1000
//! expansion:
//!   discard_errors: true
//! limits:
//!   max_nodes_per_operation: "${UAPUB_BATCH:500}"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod logging;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, ConfigFormat, ConfigLoader};
pub use logging::{build_filter, init_logging, parse_level};
pub use schema::{
    EngineConfig, ExpansionDefaults, LogFormat, LogLevel, LoggingConfig, OperationLimitsOverride,
};
