//! CLI error types.

use thiserror::Error;

use sd_auth::AuthError;
use sd_core::AccountError;
use sd_ldap::LdapError;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Resource not found.
    #[error("{resource_type} not found: {id}")]
    NotFound {
        /// Type of resource.
        resource_type: String,
        /// Resource identifier.
        id: String,
    },

    /// Directory engine rejected the operation.
    #[error("{0}")]
    Account(#[from] AccountError),

    /// Directory connection or protocol error.
    #[error("directory error: {0}")]
    Directory(#[from] LdapError),

    /// Password tooling error.
    #[error("password error: {0}")]
    Auth(#[from] AuthError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl CliError {
    /// Shorthand for a missing user.
    pub fn user_not_found(uid: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: "user".to_string(),
            id: uid.into(),
        }
    }

    /// Shorthand for a missing group.
    pub fn group_not_found(cn: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: "group".to_string(),
            id: cn.into(),
        }
    }
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
