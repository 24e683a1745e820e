//! Error types for oraorm

use std::time::Duration;
use thiserror::Error;

/// Result type alias for oraorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Boxed driver error, surfaced verbatim from the connection.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for statement compilation and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// Malformed or unsupported clause combination. Nothing was executed.
    #[error("Compile error: {0}")]
    Compile(String),

    /// A bind value could not be normalized to a physical representation.
    #[error("Conversion error for '{type_name}': {message}")]
    Conversion { type_name: String, message: String },

    /// Error returned by the underlying connection (constraint violations,
    /// syntax errors, ...). Never retried.
    #[error("Execution error: {0}")]
    Execution(#[source] DriverError),

    /// Some rows of a batch were written before a later row failed.
    ///
    /// Rows before `failed_row` are already persisted unless the caller wrapped
    /// the batch in a transaction; nothing is rolled back here.
    #[error("Batch failed at row {failed_row} after {rows_affected} affected row(s): {source}")]
    PartialBatch {
        rows_affected: u64,
        failed_row: usize,
        #[source]
        source: Box<OrmError>,
    },

    /// Execution exceeded the context deadline.
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// Execution was cancelled through the execution context.
    #[error("Query cancelled")]
    Cancelled,

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Create a conversion error for a value of the given type
    pub fn conversion(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Wrap a driver error
    pub fn execution<E>(err: E) -> Self
    where
        E: Into<DriverError>,
    {
        Self::Execution(err.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a compile error
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }

    /// Check if this is a conversion error
    pub fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion { .. })
    }

    /// Check if this is a partial batch failure
    pub fn is_partial_batch(&self) -> bool {
        matches!(self, Self::PartialBatch { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Rows persisted before the failure, for partial batch failures.
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            Self::PartialBatch { rows_affected, .. } => Some(*rows_affected),
            _ => None,
        }
    }
}
