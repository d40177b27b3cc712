//! Error taxonomy for code generation.
//!
//! Component errors ([`IdentityError`], [`CatalogError`], [`ExecutionError`],
//! [`MetricsError`]) stay inside their modules. What leaves the crate is a
//! [`GenerateError`]: a stable [`ErrorCode`], the operation that failed, and
//! the component error as its `source()`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use protogen_core::error::{OperationContext, Result};
//!
//! fn lookup(raw: &str) -> Result<PluginCoordinate> {
//!     PluginCoordinate::parse(raw).during("identity.parse")
//! }
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::catalog::CatalogError;
use crate::identity::IdentityError;
use crate::sandbox::ExecutionError;
use crate::telemetry::MetricsError;

/// A specialized Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerateError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes. These are stable; callers branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed plugin coordinate
    InvalidIdentity,
    /// No catalog record matches the coordinate
    NotFound,
    /// The sandboxed process failed to launch, exited non-zero or timed out
    ExecutionFailed,
    /// The process exited cleanly but its output is not a valid response
    ProtocolError,
    /// Recording the post-generation metric failed
    MetricsError,
    /// The caller cancelled the request
    Cancelled,
    /// The catalog backend failed or holds a corrupt record
    StorageUnavailable,
    InternalError,
}

impl ErrorCode {
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::InvalidIdentity => 1000,
            Self::NotFound => 1001,
            Self::Cancelled => 1002,
            Self::ExecutionFailed => 2000,
            Self::ProtocolError => 2001,
            Self::StorageUnavailable => 3000,
            Self::MetricsError => 3100,
            Self::InternalError => 9000,
        }
    }

    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "request",
            2000..=2099 => "plugin",
            3000..=3099 => "storage",
            3100..=3199 => "telemetry",
            _ => "internal",
        }
    }

    /// Whether the caller, rather than the service or plugin, is at fault.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidIdentity | Self::NotFound | Self::Cancelled)
    }

    /// Hint for the entry point. Nothing in this crate retries.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors
    Low,
    /// Plugin defects and failures
    Medium,
    /// Service-side failures
    High,
}

impl ErrorSeverity {
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::InvalidIdentity | ErrorCode::NotFound | ErrorCode::Cancelled => Self::Low,
            ErrorCode::ExecutionFailed | ErrorCode::ProtocolError | ErrorCode::MetricsError => {
                Self::Medium
            }
            ErrorCode::StorageUnavailable | ErrorCode::InternalError => Self::High,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The error returned by the generation orchestrator.
#[derive(Error, Debug)]
pub struct GenerateError {
    code: ErrorCode,

    /// The step that failed, e.g. `catalog.get`
    operation: Cow<'static, str>,

    message: String,

    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.operation, self.message)
    }
}

impl GenerateError {
    pub fn new(
        code: ErrorCode,
        operation: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn cancelled(operation: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Cancelled, operation, "request cancelled")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, "internal", message)
    }

    fn from_component<E>(code: ErrorCode, operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(code, operation, source.to_string()).with_source(source)
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_operation(mut self, operation: impl Into<Cow<'static, str>>) -> Self {
        self.operation = operation.into();
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }

    /// The component error, if it is of type `E`.
    pub fn source_as<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_deref().and_then(|s| s.downcast_ref::<E>())
    }

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    operation = %self.operation,
                    message = %self.message,
                    "Generation failed"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    operation = %self.operation,
                    message = %self.message,
                    "Generation failed"
                );
            }
            ErrorSeverity::Low => {
                debug!(
                    error_code = %code,
                    category = category,
                    operation = %self.operation,
                    message = %self.message,
                    "Generation rejected"
                );
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Operation Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Attach the failing operation's name while converting into [`GenerateError`].
pub trait OperationContext<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T, E> OperationContext<T> for std::result::Result<T, E>
where
    E: Into<GenerateError>,
{
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_operation(operation))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Component Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl From<IdentityError> for GenerateError {
    fn from(error: IdentityError) -> Self {
        Self::from_component(ErrorCode::InvalidIdentity, "identity.parse", error)
    }
}

impl From<CatalogError> for GenerateError {
    fn from(error: CatalogError) -> Self {
        let code = match &error {
            CatalogError::NotFound { .. } => ErrorCode::NotFound,
            CatalogError::Duplicate { .. } => ErrorCode::InternalError,
            CatalogError::InvalidConfig { .. }
            | CatalogError::Storage(_)
            | CatalogError::Read { .. }
            | CatalogError::Parse { .. } => ErrorCode::StorageUnavailable,
        };
        Self::from_component(code, "catalog", error)
    }
}

impl From<ExecutionError> for GenerateError {
    fn from(error: ExecutionError) -> Self {
        let code = match &error {
            ExecutionError::Cancelled => ErrorCode::Cancelled,
            ExecutionError::Protocol(_) => ErrorCode::ProtocolError,
            ExecutionError::Launch { .. }
            | ExecutionError::Exited { .. }
            | ExecutionError::Io(_)
            | ExecutionError::TimedOut(_) => ErrorCode::ExecutionFailed,
        };
        Self::from_component(code, "sandbox.execute", error)
    }
}

impl From<MetricsError> for GenerateError {
    fn from(error: MetricsError) -> Self {
        Self::from_component(ErrorCode::MetricsError, "metrics.record", error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_identity_error_is_client_error() {
        let err: GenerateError = IdentityError::Invalid { raw: "x".into() }.into();
        assert_eq!(err.code(), ErrorCode::InvalidIdentity);
        assert!(err.is_client_error());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_catalog_mapping() {
        let err: GenerateError = CatalogError::NotFound {
            coordinate: "a/b:c".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err: GenerateError = CatalogError::Storage(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.code(), ErrorCode::StorageUnavailable);
        assert!(err.code().is_retryable());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_execution_mapping() {
        let err: GenerateError = ExecutionError::Cancelled.into();
        assert_eq!(err.code(), ErrorCode::Cancelled);

        let decode = <prost_types::compiler::CodeGeneratorResponse as prost::Message>::decode(
            &[0xffu8][..],
        )
        .unwrap_err();
        let err: GenerateError = ExecutionError::Protocol(decode).into();
        assert_eq!(err.code(), ErrorCode::ProtocolError);
    }

    #[test]
    fn test_during_sets_operation() {
        let result: std::result::Result<(), IdentityError> =
            Err(IdentityError::Invalid { raw: "bad".into() });
        let err = result.during("orchestrator.parse").unwrap_err();
        assert_eq!(err.operation(), "orchestrator.parse");
        assert_eq!(
            err.to_string(),
            "[InvalidIdentity] orchestrator.parse: invalid plugin name: bad"
        );
        assert!(err.source_as::<IdentityError>().is_some());
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::StorageUnavailable).unwrap();
        assert_eq!(json, "\"STORAGE_UNAVAILABLE\"");
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorCode::NotFound.category(), "request");
        assert_eq!(ErrorCode::ProtocolError.category(), "plugin");
        assert_eq!(ErrorCode::MetricsError.category(), "telemetry");
        assert_eq!(ErrorCode::InternalError.category(), "internal");
    }
}
