//! Error taxonomy for directory account operations.
//!
//! Every failure carries a stable dotted code plus positional arguments so
//! that callers can render localized messages without parsing text.

use std::fmt;

use thiserror::Error;

/// Result type alias using the account error type.
pub type AccountResult<T> = std::result::Result<T, AccountError>;

/// Structured error payload shared by all error categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Stable error code, e.g. `user.mail.alreadyUsed`.
    pub code: String,
    /// Human-readable message for logs.
    pub message: String,
    /// Positional arguments for message templates.
    pub args: Vec<String>,
}

impl ErrorDetail {
    /// Creates a detail whose message is the code itself.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            message: code.clone(),
            code,
            args: Vec::new(),
        }
    }

    /// Sets the log message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message == self.code {
            write!(f, "{}", self.code)?;
        } else {
            write!(f, "{}: {}", self.code, self.message)?;
        }
        if !self.args.is_empty() {
            write!(f, " [{}]", self.args.join(", "))?;
        }
        Ok(())
    }
}

/// Errors raised by directory account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Malformed or missing input, raised before any directory call.
    #[error("validation failed: {0}")]
    Validation(ErrorDetail),

    /// A value that must be unique is already in use.
    #[error("uniqueness violation: {0}")]
    Uniqueness(ErrorDetail),

    /// Identifier or username space exhausted after bounded probing.
    #[error("allocation exhausted: {0}")]
    AllocationExhausted(ErrorDetail),

    /// Failure reported by the directory protocol.
    #[error("directory failure: {0}")]
    DirectoryProtocol(ErrorDetail),

    /// The target of a mutating operation does not exist.
    #[error("not found: {0}")]
    NotFound(ErrorDetail),
}

impl AccountError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(code: impl Into<String>) -> Self {
        Self::Validation(ErrorDetail::new(code))
    }

    /// Creates a uniqueness violation.
    #[must_use]
    pub fn uniqueness(code: impl Into<String>) -> Self {
        Self::Uniqueness(ErrorDetail::new(code))
    }

    /// Creates an allocation exhaustion error.
    #[must_use]
    pub fn exhausted(code: impl Into<String>) -> Self {
        Self::AllocationExhausted(ErrorDetail::new(code))
    }

    /// Creates a directory protocol error with diagnostic text.
    #[must_use]
    pub fn directory(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DirectoryProtocol(ErrorDetail::new(code).with_message(message))
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(code: impl Into<String>) -> Self {
        Self::NotFound(ErrorDetail::new(code))
    }

    /// Appends a positional argument to the error detail.
    #[must_use]
    pub fn with_arg(self, arg: impl ToString) -> Self {
        self.map_detail(|d| d.with_arg(arg))
    }

    /// Returns the structured detail.
    #[must_use]
    pub const fn detail(&self) -> &ErrorDetail {
        match self {
            Self::Validation(d)
            | Self::Uniqueness(d)
            | Self::AllocationExhausted(d)
            | Self::DirectoryProtocol(d)
            | Self::NotFound(d) => d,
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.detail().code
    }

    /// Returns the positional arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.detail().args
    }

    /// Returns whether this error was caused by caller input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Uniqueness(_) | Self::NotFound(_)
        )
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::DirectoryProtocol(_) | Self::AllocationExhausted(_))
    }

    fn map_detail(self, f: impl FnOnce(ErrorDetail) -> ErrorDetail) -> Self {
        match self {
            Self::Validation(d) => Self::Validation(f(d)),
            Self::Uniqueness(d) => Self::Uniqueness(f(d)),
            Self::AllocationExhausted(d) => Self::AllocationExhausted(f(d)),
            Self::DirectoryProtocol(d) => Self::DirectoryProtocol(f(d)),
            Self::NotFound(d) => Self::NotFound(f(d)),
        }
    }
}
