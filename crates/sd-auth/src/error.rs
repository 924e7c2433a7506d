//! Password error types.

use std::fmt;

use sd_core::{AccountError, ErrorDetail};

/// Password operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The repeated password does not match.
    RepeatMismatch,
    /// The new password equals the current one.
    Unchanged,
    /// The password failed strength analysis.
    Weak {
        /// Warnings and suggestions from the analyzer.
        feedback: Vec<String>,
    },
    /// The password appears in a breach corpus.
    Pwned,
    /// Hash computation failed.
    Hashing(String),
    /// Collaborator setup failed.
    Internal(String),
}

impl AuthError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RepeatMismatch => "password.repeat.mismatch",
            Self::Unchanged => "password.unchanged",
            Self::Weak { .. } => "password.weak",
            Self::Pwned => "password.pwned",
            Self::Hashing(_) => "password.hash.failed",
            Self::Internal(_) => "general.internal",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepeatMismatch => write!(f, "passwords do not match"),
            Self::Unchanged => write!(f, "new password equals the current password"),
            Self::Weak { feedback } if feedback.is_empty() => write!(f, "password is too weak"),
            Self::Weak { feedback } => write!(f, "password is too weak: {}", feedback.join("; ")),
            Self::Pwned => write!(f, "password appears in a known data breach"),
            Self::Hashing(msg) => write!(f, "password hashing failed: {msg}"),
            Self::Internal(msg) => write!(f, "internal password error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for AccountError {
    fn from(err: AuthError) -> Self {
        let detail = ErrorDetail::new(err.code()).with_message(err.to_string());
        match err {
            AuthError::Weak { feedback } => {
                let detail = feedback.into_iter().fold(detail, ErrorDetail::with_arg);
                Self::Validation(detail)
            }
            AuthError::RepeatMismatch | AuthError::Unchanged | AuthError::Pwned => {
                Self::Validation(detail)
            }
            AuthError::Hashing(_) | AuthError::Internal(_) => Self::DirectoryProtocol(detail),
        }
    }
}

/// Result type for password operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = AuthError::Unchanged;
        assert_eq!(err.to_string(), "new password equals the current password");

        let err = AuthError::Weak {
            feedback: vec!["Add another word or two.".to_string()],
        };
        assert!(err.to_string().contains("Add another word"));
    }

    #[test]
    fn weak_feedback_becomes_error_args() {
        let err: AccountError = AuthError::Weak {
            feedback: vec!["a".to_string(), "b".to_string()],
        }
        .into();
        assert_eq!(err.code(), "password.weak");
        assert_eq!(err.args(), ["a".to_string(), "b".to_string()]);
    }
}
