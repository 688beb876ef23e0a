// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the resolution engine.
//!
//! Two kinds of failure flow through the engine:
//!
//! - **`OpcUaError`**: returned as `Err` when a call cannot proceed at all
//!   (a systemic session failure, invalid caller input, cancellation).
//! - **`ServiceResult`**: a protocol status attached as a value to the
//!   smallest affected unit (one field, one frame, one entry). These never
//!   abort a pass.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Session       - Service call failures without per-item attribution
//! ├── Browse        - Browse and path translation failures
//! ├── Operation     - Read failures and bad status codes
//! ├── Configuration - Invalid caller-supplied configuration
//! ├── Resolution    - Type and metadata resolution failures
//! └── Cancelled     - The cancellation token fired
//! ```
//!
//! # Examples
//!
//! ```
//! use uapub_opcua::error::{OpcUaError, ServiceResult};
//! use uapub_opcua::types::StatusCode;
//!
//! let error = OpcUaError::node_not_found("ns=2;s=Pump");
//! let result = ServiceResult::from(&error);
//! assert_eq!(result.status_code, StatusCode::BAD_NODE_ID_UNKNOWN);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::types::StatusCode;

/// Result alias used across the crate.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Session service failure.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Browse failure.
    #[error("Browse error: {0}")]
    Browse(#[from] BrowseError),

    /// Read or status failure.
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Type or metadata resolution failure.
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl OpcUaError {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a resolution error.
    #[inline]
    pub fn resolution(error: ResolutionError) -> Self {
        Self::Resolution(error)
    }

    /// Creates a node not found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::Browse(BrowseError::node_not_found(node_id))
    }

    /// Creates a service failure error.
    pub fn service_failed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Session(SessionError::service_failed(service, message))
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: StatusCode) -> Self {
        Self::Operation(OperationError::bad_status(node_id, status_code))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this is a cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if a later resolution pass may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Session(e) => e.is_retryable(),
            Self::Browse(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Resolution(_) => true,
            Self::Configuration(_) | Self::Cancelled => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Session(_) => ErrorSeverity::Error,
            Self::Browse(e) => e.severity(),
            Self::Operation(_) => ErrorSeverity::Warning,
            Self::Resolution(_) => ErrorSeverity::Warning,
            Self::Configuration(_) => ErrorSeverity::Critical,
            Self::Cancelled => ErrorSeverity::Info,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Browse(_) => "browse",
            Self::Operation(_) => "operation",
            Self::Configuration(_) => "configuration",
            Self::Resolution(_) => "resolution",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Session(e) => e.error_code(),
            Self::Browse(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
            Self::Resolution(e) => e.error_code(),
            Self::Cancelled => ErrorCode::new(9, 1),
        }
    }

    /// Returns the OPC UA status code that best describes this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Session(e) => e.status_code(),
            Self::Browse(e) => e.status_code(),
            Self::Operation(e) => e.status_code(),
            Self::Configuration(_) => StatusCode::BAD_CONFIGURATION_ERROR,
            Self::Resolution(ResolutionError::TypeNotFound { .. }) => {
                StatusCode::BAD_DATA_TYPE_ID_UNKNOWN
            }
            Self::Resolution(_) => StatusCode::BAD_UNEXPECTED_ERROR,
            Self::Cancelled => StatusCode::BAD_REQUEST_CANCELLED_BY_CLIENT,
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Service-level session failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session is available.
    #[error("Session not connected")]
    NotConnected,

    /// A service call failed as a whole.
    #[error("{service} failed: {message}")]
    ServiceFailed {
        /// Service name.
        service: &'static str,
        /// Error message.
        message: String,
        /// Status code reported by the server, if any.
        status_code: Option<StatusCode>,
    },

    /// The server returned a different number of results than requested.
    #[error("{service} returned {actual} results for {expected} requests")]
    ResultCountMismatch {
        /// Service name.
        service: &'static str,
        /// Requested count.
        expected: usize,
        /// Returned count.
        actual: usize,
    },
}

impl SessionError {
    /// Creates a service failure.
    pub fn service_failed(service: &'static str, message: impl Into<String>) -> Self {
        Self::ServiceFailed {
            service,
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a service failure carrying a server status code.
    pub fn service_status(service: &'static str, status_code: StatusCode) -> Self {
        Self::ServiceFailed {
            service,
            message: status_code.name().to_string(),
            status_code: Some(status_code),
        }
    }

    /// Creates a result count mismatch error.
    pub fn result_count_mismatch(service: &'static str, expected: usize, actual: usize) -> Self {
        Self::ResultCountMismatch {
            service,
            expected,
            actual,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ResultCountMismatch { .. })
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotConnected => ErrorCode::new(2, 1),
            Self::ServiceFailed { .. } => ErrorCode::new(2, 2),
            Self::ResultCountMismatch { .. } => ErrorCode::new(2, 3),
        }
    }

    /// Returns the status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceFailed {
                status_code: Some(code),
                ..
            } => *code,
            Self::ResultCountMismatch { .. } => StatusCode::BAD_UNEXPECTED_ERROR,
            _ => StatusCode::BAD_COMMUNICATION_ERROR,
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Node browsing errors.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Node not found.
    #[error("Node not found: {node_id}")]
    NodeNotFound {
        /// The node ID that was not found.
        node_id: String,
    },

    /// Browse failed.
    #[error("Browse failed for node '{node_id}': {message}")]
    BrowseFailed {
        /// Node ID being browsed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Bad continuation point.
    #[error("Invalid continuation point")]
    BadContinuationPoint,

    /// Path not found.
    #[error("Path not found: {path}")]
    PathNotFound {
        /// The path that was not found.
        path: String,
    },
}

impl BrowseError {
    /// Creates a node not found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Creates a browse failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a path not found error.
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BrowseFailed { .. } | Self::BadContinuationPoint)
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::BrowseFailed { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NodeNotFound { .. } => ErrorCode::new(4, 1),
            Self::BrowseFailed { .. } => ErrorCode::new(4, 2),
            Self::BadContinuationPoint => ErrorCode::new(4, 4),
            Self::PathNotFound { .. } => ErrorCode::new(4, 9),
        }
    }

    /// Returns the status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NodeNotFound { .. } => StatusCode::BAD_NODE_ID_UNKNOWN,
            Self::BrowseFailed { .. } => StatusCode::BAD_COMMUNICATION_ERROR,
            Self::BadContinuationPoint => StatusCode::BAD_CONTINUATION_POINT_INVALID,
            Self::PathNotFound { .. } => StatusCode::BAD_NO_MATCH,
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read operation errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Read operation failed.
    #[error("Read failed for node '{node_id}': {message}")]
    ReadFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// The server returned a bad status for an item.
    #[error("Bad status for node '{node_id}': {status_code}")]
    BadStatus {
        /// Node ID.
        node_id: String,
        /// Status code.
        status_code: StatusCode,
    },

    /// Operation not supported.
    #[error("Operation not supported: {operation}")]
    NotSupported {
        /// Operation name.
        operation: String,
    },
}

impl OperationError {
    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: StatusCode) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
        }
    }

    /// Creates a not supported error.
    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }

    /// Returns the human-readable name for an OPC UA status code.
    pub fn status_code_name(code: u32) -> &'static str {
        match code {
            0x0000_0000 => "Good",
            0x8000_0000 => "Bad",
            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8005_0000 => "BadCommunicationError",
            0x800A_0000 => "BadTimeout",
            0x800B_0000 => "BadServiceUnsupported",
            0x800F_0000 => "BadNothingToDo",
            0x8010_0000 => "BadTooManyOperations",
            0x8011_0000 => "BadDataTypeIdUnknown",
            0x801F_0000 => "BadUserAccessDenied",
            0x802C_0000 => "BadRequestCancelledByClient",
            0x8033_0000 => "BadNodeIdInvalid",
            0x8034_0000 => "BadNodeIdUnknown",
            0x8035_0000 => "BadAttributeIdInvalid",
            0x803A_0000 => "BadNotReadable",
            0x803D_0000 => "BadNotSupported",
            0x803E_0000 => "BadNotFound",
            0x804A_0000 => "BadContinuationPointInvalid",
            0x804B_0000 => "BadNoContinuationPoints",
            0x8060_0000 => "BadBrowseNameInvalid",
            0x806F_0000 => "BadNoMatch",
            0x8074_0000 => "BadTypeMismatch",
            0x8089_0000 => "BadConfigurationError",
            0x80AB_0000 => "BadInvalidArgument",
            _ => "Unknown",
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotSupported { .. })
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ReadFailed { .. } => ErrorCode::new(5, 1),
            Self::BadStatus { .. } => ErrorCode::new(5, 3),
            Self::NotSupported { .. } => ErrorCode::new(5, 8),
        }
    }

    /// Returns the status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ReadFailed { .. } => StatusCode::BAD_COMMUNICATION_ERROR,
            Self::BadStatus { status_code, .. } => *status_code,
            Self::NotSupported { .. } => StatusCode::BAD_NOT_SUPPORTED,
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid caller-supplied configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid node ID string.
    #[error("Invalid node ID '{node_id}': {reason}")]
    InvalidNodeId {
        /// The node ID string.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// Invalid relative browse path.
    #[error("Invalid browse path '{path}': {reason}")]
    InvalidBrowsePath {
        /// The path string.
        path: String,
        /// Reason.
        reason: String,
    },

    /// Required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// Invalid event filter.
    #[error("Invalid event filter: {message}")]
    InvalidFilter {
        /// Error message.
        message: String,
    },

    /// Invalid published nodes entry.
    #[error("Invalid entry: {message}")]
    InvalidEntry {
        /// Error message.
        message: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid node ID error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid browse path error.
    pub fn invalid_browse_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBrowsePath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    /// Creates an invalid entry error.
    pub fn invalid_entry(message: impl Into<String>) -> Self {
        Self::InvalidEntry {
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidNodeId { .. } => ErrorCode::new(8, 2),
            Self::InvalidBrowsePath { .. } => ErrorCode::new(8, 3),
            Self::MissingField { .. } => ErrorCode::new(8, 5),
            Self::InvalidFilter { .. } => ErrorCode::new(8, 10),
            Self::InvalidEntry { .. } => ErrorCode::new(8, 11),
        }
    }
}

// =============================================================================
// ResolutionError
// =============================================================================

/// Type and metadata resolution failures.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A data type node could not be fetched.
    #[error("Data type not found: {type_id}")]
    TypeNotFound {
        /// The data type node id.
        type_id: String,
    },

    /// Metadata could not be produced for a node.
    #[error("Metadata unavailable for '{node_id}': {message}")]
    MetadataUnavailable {
        /// Node id.
        node_id: String,
        /// Error message.
        message: String,
    },
}

impl ResolutionError {
    /// Creates a type not found error.
    pub fn type_not_found(type_id: impl Into<String>) -> Self {
        Self::TypeNotFound {
            type_id: type_id.into(),
        }
    }

    /// Creates a metadata unavailable error.
    pub fn metadata_unavailable(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::TypeNotFound { .. } => ErrorCode::new(7, 1),
            Self::MetadataUnavailable { .. } => ErrorCode::new(7, 2),
        }
    }
}

// =============================================================================
// ServiceResult
// =============================================================================

/// Structured protocol error attached to a field, frame or entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ServiceResult {
    /// Status code.
    pub status_code: StatusCode,

    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ServiceResult {
    /// Creates a result from a status code and message.
    pub fn new(status_code: StatusCode, error_message: impl Into<String>) -> Self {
        Self {
            status_code,
            error_message: Some(error_message.into()),
        }
    }

    /// Creates a result from a status code only.
    pub fn from_status(status_code: StatusCode) -> Self {
        Self {
            status_code,
            error_message: None,
        }
    }

    /// Returns `true` if the status code is good.
    pub fn is_good(&self) -> bool {
        self.status_code.is_good()
    }
}

impl From<&OpcUaError> for ServiceResult {
    fn from(error: &OpcUaError) -> Self {
        Self::new(error.status_code(), error.to_string())
    }
}

impl fmt::Display for ServiceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_message {
            Some(message) => write!(f, "{}: {}", self.status_code.name(), message),
            None => write!(f, "{}", self.status_code.name()),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
///
/// Format: `UA-XXYY` where XX is category and YY is specific error.
///
/// Categories:
/// - 2: Session
/// - 4: Browse
/// - 5: Operation
/// - 7: Resolution
/// - 8: Configuration
/// - 9: Cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category.
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::new(4, 1).to_string(), "UA-0401");
        assert_eq!(OpcUaError::Cancelled.error_code().to_string(), "UA-0901");
    }

    #[test]
    fn test_service_result_from_error() {
        let error = OpcUaError::bad_status("ns=2;s=X", StatusCode::BAD_NOT_FOUND);
        let result = ServiceResult::from(&error);
        assert_eq!(result.status_code, StatusCode::BAD_NOT_FOUND);
        assert!(result.error_message.unwrap().contains("ns=2;s=X"));

        let config = OpcUaError::configuration(ConfigurationError::missing_field("id"));
        assert_eq!(
            ServiceResult::from(&config).status_code,
            StatusCode::BAD_CONFIGURATION_ERROR
        );
    }

    #[test]
    fn test_error_properties() {
        let error = OpcUaError::service_failed("Browse", "connection reset");
        assert!(error.is_retryable());
        assert_eq!(error.category(), "session");
        assert_eq!(error.status_code(), StatusCode::BAD_COMMUNICATION_ERROR);

        assert!(OpcUaError::Cancelled.is_cancelled());
        assert!(!OpcUaError::Cancelled.is_retryable());
        assert_eq!(
            OpcUaError::configuration(ConfigurationError::invalid_filter("x")).severity(),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_service_result_display() {
        let result = ServiceResult::new(StatusCode::BAD_NOT_FOUND, "No objects resolved.");
        assert_eq!(result.to_string(), "BadNotFound: No objects resolved.");
        assert_eq!(
            ServiceResult::from_status(StatusCode::BAD_NO_MATCH).to_string(),
            "BadNoMatch"
        );
    }
}
