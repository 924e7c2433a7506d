//! Password hash formats stored in the directory.
//!
//! - `userPassword`: `{CRYPT}` prefixed SHA-512 crypt with a random salt
//! - `sambaNTPassword`: uppercase hex MD4 over the UTF-16LE password

use md4::{Digest, Md4};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha_crypt::{sha512_check, sha512_simple, Sha512Params};

use crate::error::{AuthError, AuthResult};

/// Scheme prefix for crypt(3) values in `userPassword`.
pub const CRYPT_PREFIX: &str = "{CRYPT}";

/// Length of generated passwords.
pub const RANDOM_PASSWORD_LENGTH: usize = 32;

/// Hashes a password as `{CRYPT}$6$<salt>$<hash>`.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if the crypt computation fails.
pub fn salted_crypt(password: &str) -> AuthResult<String> {
    let hashed = sha512_simple(password, &Sha512Params::default())
        .map_err(|e| AuthError::Hashing(format!("{e:?}")))?;
    Ok(format!("{CRYPT_PREFIX}{hashed}"))
}

/// Checks a password against a stored `userPassword` value.
///
/// Values without the `{CRYPT}` prefix are compared as plaintext.
#[must_use]
pub fn verify(password: &str, stored: &str) -> bool {
    match stored.strip_prefix(CRYPT_PREFIX) {
        Some(hashed) => sha512_check(password, hashed).is_ok(),
        None => !stored.is_empty() && stored == password,
    }
}

/// Computes the legacy NT hash of a password.
#[must_use]
pub fn nt_hash(password: &str) -> String {
    let utf16le: Vec<u8> = password.encode_utf16().flat_map(u16::to_le_bytes).collect();
    hex::encode_upper(Md4::digest(&utf16le))
}

/// Generates a random alphanumeric string.
#[must_use]
pub fn random_alphanumeric(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generates a random password for freshly created accounts.
#[must_use]
pub fn random_password() -> String {
    random_alphanumeric(RANDOM_PASSWORD_LENGTH)
}
