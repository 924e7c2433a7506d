//! Breached password lookup.
//!
//! Uses the k-anonymity range API: only the first 5 characters of the
//! uppercase SHA-1 hash leave the process, and the returned suffix list is
//! matched locally.

use std::time::Duration;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Default range API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.pwnedpasswords.com";

/// Checks passwords against a breach corpus.
#[async_trait]
pub trait BreachCheck: Send + Sync {
    /// Returns whether the password is known to be breached.
    async fn is_pwned(&self, password: &str) -> bool;
}

/// Splits the uppercase SHA-1 hex digest into the 5-character range prefix
/// and the remaining suffix.
#[must_use]
pub fn hash_prefix_and_suffix(password: &str) -> (String, String) {
    let hash = hex::encode_upper(Sha1::digest(password.as_bytes()));
    let (prefix, suffix) = hash.split_at(5);
    (prefix.to_string(), suffix.to_string())
}

/// Returns whether a range response body lists `suffix`.
#[must_use]
pub fn range_contains(body: &str, suffix: &str) -> bool {
    body.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .any(|(line_suffix, _count)| line_suffix.eq_ignore_ascii_case(suffix))
}

/// HTTP client for the Pwned Passwords range API.
#[derive(Debug, Clone)]
pub struct PwnedPasswordsClient {
    client: reqwest::Client,
    api_url: String,
}

impl PwnedPasswordsClient {
    /// Creates a client for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the HTTP client cannot be built.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sd-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_range(&self, prefix: &str) -> Result<String, reqwest::Error> {
        let url = format!("{}/range/{prefix}", self.api_url);
        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl BreachCheck for PwnedPasswordsClient {
    /// Fails open: an unreachable API counts as "not breached".
    async fn is_pwned(&self, password: &str) -> bool {
        let (prefix, suffix) = hash_prefix_and_suffix(password);
        match self.fetch_range(&prefix).await {
            Ok(body) => range_contains(&body, &suffix),
            Err(e) => {
                warn!(error = %e, "breach lookup failed, treating password as not breached");
                false
            }
        }
    }
}
