//! # sd-auth
//!
//! Password handling for the staff directory.
//!
//! This crate provides:
//! - Hash formats written to the directory (SHA-512 crypt, NT hash)
//! - Strength analysis via zxcvbn
//! - Breached-password lookup via the k-anonymity range API
//! - The ordered validation steps of a password change

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod hash;
pub mod password;
pub mod pwned;
pub mod strength;

pub use error::{AuthError, AuthResult};
pub use password::{PasswordChange, PasswordHashes, PasswordPolicy};
pub use pwned::{BreachCheck, PwnedPasswordsClient};
pub use strength::{PasswordAnalysis, PasswordAnalyzer};
