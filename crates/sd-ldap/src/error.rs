//! LDAP-specific error types.
//!
//! ## Security Note
//!
//! Error messages must not leak bind credentials or user passwords.

use sd_core::{AccountError, ErrorDetail};
use thiserror::Error;

/// LDAP-specific errors.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Invalid configuration.
    #[error("LDAP configuration error: {0}")]
    Configuration(String),

    /// Connection URL must use LDAPS outside development mode.
    #[error("Security error: only LDAPS is supported. URL must start with 'ldaps://'.")]
    InsecureProtocol,

    /// Connection failed.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// Service account bind failed.
    #[error("LDAP bind failed: {0}")]
    Bind(String),

    /// The server answered an operation with a non-success result code.
    #[error("LDAP {operation} failed: {} ({code}): {message}", code_name(*.code))]
    Operation {
        /// Operation name (search, add, modify, modifyDN, bind).
        operation: &'static str,
        /// LDAP result code.
        code: u32,
        /// Diagnostic message from the server.
        message: String,
    },

    /// A lookup that must be unique matched several entries.
    #[error("ambiguous entry: {0}")]
    AmbiguousEntry(String),

    /// Pool exhausted.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Underlying ldap3 error.
    #[error("LDAP error: {0}")]
    Ldap3(#[from] ldap3::LdapError),
}

/// Result code for invalid credentials.
pub const RC_INVALID_CREDENTIALS: u32 = 49;
/// Result code for an existing entry.
pub const RC_ENTRY_ALREADY_EXISTS: u32 = 68;
/// Result code for a missing entry.
pub const RC_NO_SUCH_OBJECT: u32 = 32;

/// Returns the symbolic name of an LDAP result code.
#[must_use]
pub const fn code_name(code: u32) -> &'static str {
    match code {
        0 => "SUCCESS",
        1 => "OPERATIONS_ERROR",
        2 => "PROTOCOL_ERROR",
        3 => "TIME_LIMIT_EXCEEDED",
        4 => "SIZE_LIMIT_EXCEEDED",
        16 => "NO_SUCH_ATTRIBUTE",
        17 => "UNDEFINED_ATTRIBUTE_TYPE",
        19 => "CONSTRAINT_VIOLATION",
        20 => "ATTRIBUTE_OR_VALUE_EXISTS",
        21 => "INVALID_ATTRIBUTE_SYNTAX",
        32 => "NO_SUCH_OBJECT",
        34 => "INVALID_DN_SYNTAX",
        49 => "INVALID_CREDENTIALS",
        50 => "INSUFFICIENT_ACCESS_RIGHTS",
        51 => "BUSY",
        52 => "UNAVAILABLE",
        53 => "UNWILLING_TO_PERFORM",
        64 => "NAMING_VIOLATION",
        65 => "OBJECT_CLASS_VIOLATION",
        67 => "NOT_ALLOWED_ON_RDN",
        68 => "ENTRY_ALREADY_EXISTS",
        80 => "OTHER",
        _ => "UNKNOWN",
    }
}

impl LdapError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an operation error from a result code.
    #[must_use]
    pub fn operation(operation: &'static str, code: u32, message: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            code,
            message: message.into(),
        }
    }

    /// Converts an ldap3 failure of `operation`, keeping the result code.
    #[must_use]
    pub fn from_ldap3(operation: &'static str, err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => {
                Self::operation(operation, result.rc, result.text)
            }
            other => Self::Ldap3(other),
        }
    }

    /// Returns the LDAP result code, if the server sent one.
    #[must_use]
    pub const fn result_code(&self) -> Option<u32> {
        match self {
            Self::Operation { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::PoolExhausted | Self::Ldap3(_)
        )
    }

    /// Checks if this is a security-related error.
    #[must_use]
    pub const fn is_security_error(&self) -> bool {
        matches!(self, Self::InsecureProtocol | Self::Bind(_))
    }

    /// Converts into an account error with a caller-chosen code.
    ///
    /// The positional arguments are the diagnostic text, the symbolic result
    /// code and the numeric result code.
    #[must_use]
    pub fn into_account_error(self, code: &str) -> AccountError {
        tracing::error!(error = %self, code, "directory operation failed");
        let rc = self.result_code().unwrap_or(80);
        let message = match &self {
            Self::Operation { message, .. } => message.clone(),
            other => other.to_string(),
        };
        AccountError::DirectoryProtocol(
            ErrorDetail::new(code)
                .with_message(self.to_string())
                .with_arg(message)
                .with_arg(code_name(rc))
                .with_arg(rc),
        )
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for AccountError {
    fn from(err: LdapError) -> Self {
        err.into_account_error("general.ldap.failed")
    }
}
