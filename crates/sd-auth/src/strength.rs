//! Password strength analysis backed by zxcvbn.

use zxcvbn::zxcvbn;

/// Minimum zxcvbn score (0..=4) a password must reach.
pub const MIN_SCORE: u8 = 3;

/// Result of analyzing one password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordAnalysis {
    /// zxcvbn score, 0 (weakest) to 4.
    pub score: u8,
    /// Suggestions followed by the warning, if any.
    pub feedback: Vec<String>,
}

impl PasswordAnalysis {
    /// A password passes only with a sufficient score and no feedback at all.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        self.score >= MIN_SCORE && self.feedback.is_empty()
    }
}

/// Estimates password strength.
#[derive(Debug, Clone, Default)]
pub struct PasswordAnalyzer;

impl PasswordAnalyzer {
    /// Analyzes a password. `user_inputs` are personal words (names, uid)
    /// that make a password easier to guess.
    #[must_use]
    pub fn analyze(&self, password: &str, user_inputs: &[&str]) -> PasswordAnalysis {
        let entropy = match zxcvbn(password, user_inputs) {
            Ok(entropy) => entropy,
            Err(e) => {
                return PasswordAnalysis {
                    score: 0,
                    feedback: vec![e.to_string()],
                }
            }
        };

        let mut feedback = Vec::new();
        if let Some(fb) = entropy.feedback() {
            feedback.extend(fb.suggestions().iter().map(ToString::to_string));
            if let Some(warning) = fb.warning() {
                feedback.push(warning.to_string());
            }
        }

        PasswordAnalysis {
            score: entropy.score(),
            feedback,
        }
    }
}
