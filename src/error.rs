//! Error types for the Lightwave bridge
//!
//! Every failure is local to the operation that caused it. The variants map
//! onto the bridge's failure classes (connection, authorization, discovery,
//! per-device control) plus the ambient configuration and I/O errors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error types for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The vendor transport could not establish a session
    #[error("Connection error: {0}")]
    Connection(String),

    /// The vendor backend refused or failed the registration handshake
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Querying the vendor device list failed
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// A vendor on/off/dim call failed
    #[error("Device control error: {0}")]
    DeviceControl(String),

    /// The host device model rejected a registration or unregistration
    #[error("Device registration error: {0}")]
    Registration(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input errors (malformed command payloads and the like)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current registration state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Host platform is older than the bridge supports
    #[error("Incompatible host: {0}")]
    IncompatibleHost(String),

    /// Not found errors (devices, handlers)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Connection errors (1000-1099)
    ConnectionRefused,

    // Authentication errors (1100-1199)
    RegistrationRejected,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,
    HostVersionUnsupported,

    // Device errors (1300-1399)
    DeviceNotFound,
    DeviceControlFailed,
    DeviceRegistrationFailed,
    DiscoveryFailed,

    // Data errors (1400-1499)
    InvalidInput,
    ParsingFailed,

    // Internal errors (1900-1999)
    IoFailure,
    UnexpectedState,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::ConnectionRefused => 1002,
            ErrorCode::RegistrationRejected => 1101,
            ErrorCode::ConfigurationInvalid => 1202,
            ErrorCode::HostVersionUnsupported => 1210,
            ErrorCode::DeviceNotFound => 1301,
            ErrorCode::DeviceControlFailed => 1303,
            ErrorCode::DeviceRegistrationFailed => 1305,
            ErrorCode::DiscoveryFailed => 1306,
            ErrorCode::InvalidInput => 1402,
            ErrorCode::ParsingFailed => 1401,
            ErrorCode::IoFailure => 1901,
            ErrorCode::UnexpectedState => 1903,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1000..=1099 => "connection",
            1100..=1199 => "authentication",
            1200..=1299 => "configuration",
            1300..=1399 => "device",
            1400..=1499 => "data",
            1900..=1999 => "internal",
            _ => "unknown",
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Low severity - information only
    Info,
    /// Medium severity - warning condition
    Warning,
    /// High severity - error condition
    Error,
    /// Critical severity - the bridge cannot operate
    Critical,
}

/// Structured error context with additional metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Error code for machine processing
    pub code: ErrorCode,
    /// Component that generated the error
    pub component: String,
    /// Operation that was being performed
    pub operation: String,
    /// Additional metadata about the error
    pub metadata: HashMap<String, serde_json::Value>,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    /// Create new error context
    pub fn new(code: ErrorCode, component: &str, operation: &str) -> Self {
        Self {
            code,
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Add metadata to error context
    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Error representation for structured logging
#[derive(Debug, Clone, Serialize)]
pub struct StructuredError {
    pub code: ErrorCode,
    pub code_number: u32,
    pub category: &'static str,
    pub message: String,
    pub is_retryable: bool,
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub severity: ErrorSeverity,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl BridgeError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a discovery error
    pub fn discovery<S: Into<String>>(msg: S) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a device control error
    pub fn device_control<S: Into<String>>(msg: S) -> Self {
        Self::DeviceControl(msg.into())
    }

    /// Create a host registration error
    pub fn registration<S: Into<String>>(msg: S) -> Self {
        Self::Registration(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Map this error to a structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            BridgeError::Connection(_) => ErrorCode::ConnectionRefused,
            BridgeError::Authentication(_) => ErrorCode::RegistrationRejected,
            BridgeError::Discovery(_) => ErrorCode::DiscoveryFailed,
            BridgeError::DeviceControl(_) => ErrorCode::DeviceControlFailed,
            BridgeError::Registration(_) => ErrorCode::DeviceRegistrationFailed,
            BridgeError::Config(_) => ErrorCode::ConfigurationInvalid,
            BridgeError::IncompatibleHost(_) => ErrorCode::HostVersionUnsupported,
            BridgeError::InvalidInput(_) => ErrorCode::InvalidInput,
            BridgeError::InvalidState(_) => ErrorCode::UnexpectedState,
            BridgeError::NotFound(_) => ErrorCode::DeviceNotFound,
            BridgeError::Io(_) => ErrorCode::IoFailure,
            BridgeError::Toml(_) => ErrorCode::ParsingFailed,
        }
    }

    /// Severity used when the error is reported at an operation boundary
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BridgeError::Connection(_)
            | BridgeError::IncompatibleHost(_)
            | BridgeError::Config(_) => ErrorSeverity::Critical,
            BridgeError::Authentication(_)
            | BridgeError::Registration(_)
            | BridgeError::Io(_)
            | BridgeError::Toml(_) => ErrorSeverity::Error,
            BridgeError::Discovery(_)
            | BridgeError::DeviceControl(_)
            | BridgeError::InvalidInput(_)
            | BridgeError::NotFound(_) => ErrorSeverity::Warning,
            BridgeError::InvalidState(_) => ErrorSeverity::Info,
        }
    }

    /// Whether an operator (or an outer retry policy) can sensibly retry.
    /// The bridge itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Connection(_)
                | BridgeError::Authentication(_)
                | BridgeError::Discovery(_)
                | BridgeError::DeviceControl(_)
        )
    }

    /// Create a structured error from this BridgeError
    pub fn to_structured_error(&self, context: Option<ErrorContext>) -> StructuredError {
        let code = self.to_error_code();
        let context = context.unwrap_or_else(|| ErrorContext::new(code, "unknown", "unknown"));

        StructuredError {
            code,
            code_number: code.as_number(),
            category: code.category(),
            message: self.to_string(),
            is_retryable: self.is_retryable(),
            component: context.component,
            operation: context.operation,
            metadata: context.metadata,
            severity: self.severity(),
            timestamp: context.timestamp,
        }
    }
}

/// Error logging and reporting utilities
pub struct ErrorReporter;

impl ErrorReporter {
    /// Log a structured error with appropriate severity
    pub fn log_error(error: &BridgeError, context: Option<ErrorContext>) {
        let structured = error.to_structured_error(context);

        match structured.severity {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                tracing::error!(
                    error_code = structured.code_number,
                    category = structured.category,
                    component = %structured.component,
                    operation = %structured.operation,
                    retryable = structured.is_retryable,
                    "{}",
                    structured.message
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error_code = structured.code_number,
                    category = structured.category,
                    component = %structured.component,
                    operation = %structured.operation,
                    retryable = structured.is_retryable,
                    "{}",
                    structured.message
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error_code = structured.code_number,
                    category = structured.category,
                    component = %structured.component,
                    operation = %structured.operation,
                    "{}",
                    structured.message
                );
            }
        }
    }

    /// Create an error context for an operation
    pub fn create_context(code: ErrorCode, component: &str, operation: &str) -> ErrorContext {
        ErrorContext::new(code, component, operation)
    }
}

/// Macro for easy structured error logging
#[macro_export]
macro_rules! log_structured_error {
    ($error:expr, $component:expr, $operation:expr) => {
        $crate::error::ErrorReporter::log_error(
            &$error,
            Some($crate::error::ErrorReporter::create_context(
                $error.to_error_code(),
                $component,
                $operation,
            )),
        )
    };
}
