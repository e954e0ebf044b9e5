//! Backing store error types.
//!
//! Every failure talking to the store is one of these variants. The cache
//! core treats all of them as "backing store unavailable".

use std::fmt;

/// Errors that can occur during backing store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to obtain or keep a connection to the store.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The store rejected or failed to execute a command.
    #[error("Command '{command}' failed: {message}")]
    Command {
        /// The command that failed (e.g. `SET`, `SMEMBERS`).
        command: String,
        /// Description of the failure.
        message: String,
    },

    /// The key holds a value of a different type than the operation expects.
    #[error("Wrong type for key '{key}': expected {expected}")]
    WrongType {
        /// The offending key.
        key: String,
        /// The type the operation expected (`string`, `set`, `list`, `counter`).
        expected: &'static str,
    },

    /// An internal store error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a new `WrongType` error.
    #[must_use]
    pub fn wrong_type(key: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            key: key.into(),
            expected,
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` if this is a wrong type error.
    #[must_use]
    pub fn is_wrong_type(&self) -> bool {
        matches!(self, Self::WrongType { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Command { .. } => ErrorCategory::Command,
            Self::WrongType { .. } => ErrorCategory::Data,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Infrastructure/connection error.
    Infrastructure,
    /// Command execution error.
    Command,
    /// Stored data does not have the expected shape.
    Data,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Command => write!(f, "command"),
            Self::Data => write!(f, "data"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::connection("refused");
        assert_eq!(err.to_string(), "Connection error: refused");

        let err = StoreError::command("SET", "OOM");
        assert_eq!(err.to_string(), "Command 'SET' failed: OOM");

        let err = StoreError::wrong_type("cache:tag:a", "set");
        assert_eq!(
            err.to_string(),
            "Wrong type for key 'cache:tag:a': expected set"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            StoreError::connection("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(StoreError::command("GET", "x").category(), ErrorCategory::Command);
        assert_eq!(StoreError::wrong_type("k", "list").category(), ErrorCategory::Data);
        assert_eq!(StoreError::internal("x").category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_error_predicates() {
        assert!(StoreError::connection("x").is_connection());
        assert!(!StoreError::internal("x").is_connection());
        assert!(StoreError::wrong_type("k", "set").is_wrong_type());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
        assert_eq!(ErrorCategory::Data.to_string(), "data");
    }
}
