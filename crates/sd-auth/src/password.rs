//! Password change validation.
//!
//! A new password is accepted only after these steps, in order:
//! 1. The repeated entry matches
//! 2. It differs from the current password
//! 3. Strength analysis reports no feedback and a sufficient score
//! 4. It does not appear in the breach corpus
//!
//! Each step fails fast so that no later step (in particular the network
//! lookup) runs for a password already rejected.

use std::sync::Arc;

use crate::error::{AuthError, AuthResult};
use crate::hash::{nt_hash, salted_crypt};
use crate::pwned::BreachCheck;
use crate::strength::PasswordAnalyzer;

/// A requested password change.
#[derive(Debug, Clone, Copy)]
pub struct PasswordChange<'a> {
    /// Current password.
    pub old_password: &'a str,
    /// Requested password.
    pub new_password: &'a str,
    /// Requested password, typed again.
    pub new_password_repeat: &'a str,
}

/// Hash values written to the directory for a new password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHashes {
    /// Value for `userPassword`.
    pub user_password: String,
    /// Value for `sambaNTPassword`.
    pub nt_password: String,
}

impl PasswordHashes {
    /// Computes the hashes for a password. With `plaintext` set, the
    /// `userPassword` value is stored unhashed (development directories only).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Hashing` if the crypt computation fails.
    pub fn compute(password: &str, plaintext: bool) -> AuthResult<Self> {
        let user_password = if plaintext {
            password.to_string()
        } else {
            salted_crypt(password)?
        };
        Ok(Self {
            user_password,
            nt_password: nt_hash(password),
        })
    }
}

/// Validates password changes.
#[derive(Clone)]
pub struct PasswordPolicy {
    analyzer: PasswordAnalyzer,
    breach: Arc<dyn BreachCheck>,
}

impl std::fmt::Debug for PasswordPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordPolicy").finish_non_exhaustive()
    }
}

impl PasswordPolicy {
    /// Creates a policy using the given breach lookup.
    #[must_use]
    pub fn new(breach: Arc<dyn BreachCheck>) -> Self {
        Self {
            analyzer: PasswordAnalyzer,
            breach,
        }
    }

    /// Runs every validation step for a change.
    ///
    /// `user_inputs` are personal words passed to strength analysis.
    ///
    /// # Errors
    ///
    /// Returns the first failing step as an `AuthError`.
    pub async fn check(&self, change: &PasswordChange<'_>, user_inputs: &[&str]) -> AuthResult<()> {
        if change.new_password != change.new_password_repeat {
            return Err(AuthError::RepeatMismatch);
        }
        if change.new_password == change.old_password {
            return Err(AuthError::Unchanged);
        }

        let analysis = self.analyzer.analyze(change.new_password, user_inputs);
        if !analysis.is_acceptable() {
            tracing::debug!(score = analysis.score, "password rejected by strength analysis");
            return Err(AuthError::Weak {
                feedback: analysis.feedback,
            });
        }

        if self.breach.is_pwned(change.new_password).await {
            return Err(AuthError::Pwned);
        }
        Ok(())
    }
}
