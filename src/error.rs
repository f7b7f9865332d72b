//! Error types for GroupScope.
//!
//! All errors in GroupScope are strongly typed using thiserror.
//! Absent identifiers and names are never errors; they are modelled as
//! `Option` and fall into the "no root" / empty-normalization paths.

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised while building configuration or registry entries.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A configuration value the engine cannot operate with.
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        /// Dotted path of the field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A registry entry that cannot be evaluated.
    #[error("Registry entry '{name}' is malformed: {reason}")]
    MalformedRegistryEntry {
        /// Entry name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The registry document as a whole is unreadable.
    #[error("Registry document could not be read: {reason}")]
    InvalidRegistryDocument {
        /// Read or parse failure.
        reason: String,
    },
}

impl ValidationError {
    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed-registry-entry error.
    #[must_use]
    pub fn entry(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRegistryEntry {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Execution errors that occur while talking to the record store.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A store call failed.
    #[error("Record store unavailable during {operation}: {message}")]
    StoreUnavailable {
        /// Store method that failed.
        operation: String,
        /// Storage error text.
        message: String,
    },

    /// The deadline passed while waiting.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// Budget of the call.
        duration_ms: u64,
    },

    /// The queue stayed full until the deadline.
    #[error("Worker pool '{pool}' queue is full (capacity {capacity})")]
    QueueFull {
        /// Pool name.
        pool: String,
        /// Queue capacity.
        capacity: usize,
    },

    /// The pool shut down or a job died before replying.
    #[error("Worker pool '{pool}' is disconnected")]
    Disconnected {
        /// Pool name.
        pool: String,
    },
}

impl ExecutionError {
    /// Wraps a storage failure for the named store operation.
    #[must_use]
    pub fn store(operation: impl Into<String>, err: &StorageError) -> Self {
        Self::StoreUnavailable {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}

/// Top-level error type for GroupScope.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad configuration or registry input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Store or pool failure.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Engine bug or resource failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl EngineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the failure was caused by the record store being unreachable.
    #[must_use]
    pub const fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Execution(ExecutionError::StoreUnavailable { .. })
        )
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false, // Bad input won't change on retry
            Self::Execution(e) => matches!(
                e,
                ExecutionError::StoreUnavailable { .. }
                    | ExecutionError::Timeout { .. }
                    | ExecutionError::QueueFull { .. }
            ),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for GroupScope operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_config() {
        let err = ValidationError::config("fuzzy_threshold", "must be within [0, 1]");
        let msg = format!("{err}");
        assert!(msg.contains("fuzzy_threshold"));
        assert!(msg.contains("[0, 1]"));
    }

    #[test]
    fn test_validation_error_entry() {
        let err = ValidationError::entry("Acme", "missing name pattern");
        let msg = format!("{err}");
        assert!(msg.contains("Acme"));
        assert!(msg.contains("malformed"));
    }

    #[test]
    fn test_execution_error_store() {
        let err = ExecutionError::store(
            "sample_distinct_names",
            &StorageError::Unavailable("connection refused".to_string()),
        );
        let msg = format!("{err}");
        assert!(msg.contains("sample_distinct_names"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_execution_error_timeout() {
        let err = ExecutionError::Timeout { duration_ms: 5000 };
        assert!(format!("{err}").contains("5000ms"));
    }

    #[test]
    fn test_engine_error_from_validation() {
        let err: EngineError = ValidationError::config("root_length", "zero").into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_engine_error_store_unavailable() {
        let err: EngineError = ExecutionError::StoreUnavailable {
            operation: "fetch_by_exact_name".to_string(),
            message: "down".to_string(),
        }
        .into();
        assert!(err.is_execution());
        assert!(err.is_store_unavailable());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_engine_error_internal() {
        let err = EngineError::internal("registry lock poisoned");
        assert!(err.is_internal());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("registry lock poisoned"));
    }

    #[test]
    fn test_disconnected_is_not_retryable() {
        let err: EngineError = ExecutionError::Disconnected {
            pool: "store".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
    }
}
