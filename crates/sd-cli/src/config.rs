//! CLI configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sd_auth::pwned::DEFAULT_API_URL;
use sd_ldap::LdapConfig;

/// Environment variable holding the bind credential.
pub const BIND_PASSWORD_ENV: &str = "SDCTL_BIND_PASSWORD";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Output format.
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Directory configuration.
    pub ldap: Option<LdapConfig>,

    /// Maintenance report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Breached password lookup settings.
    #[serde(default)]
    pub breach: BreachConfig,
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> crate::CliResult<Self> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(crate::CliError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => Self::config_path()?,
        };

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        if let Ok(password) = std::env::var(BIND_PASSWORD_ENV) {
            if let Some(ldap) = config.ldap.as_mut() {
                ldap.bind_credential = password;
            }
        }
        Ok(config)
    }

    /// Parses a configuration document.
    pub fn parse(content: &str) -> crate::CliResult<Self> {
        toml::from_str(content)
            .map_err(|e| crate::CliError::Config(format!("failed to parse config: {e}")))
    }

    /// Gets the configuration file path.
    pub fn config_path() -> crate::CliResult<PathBuf> {
        let dir = dirs_next::config_dir().ok_or_else(|| {
            crate::CliError::Config("could not determine config directory".to_string())
        })?;
        Ok(dir.join("sdctl").join("sdctl.toml"))
    }

    /// Returns the validated directory configuration.
    pub fn directory(&self) -> crate::CliResult<LdapConfig> {
        let ldap = self
            .ldap
            .clone()
            .ok_or_else(|| crate::CliError::Config("missing [ldap] section".to_string()))?;
        ldap.validate()?;
        Ok(ldap)
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// Maintenance report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Recipients of the maintenance report.
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Default look-ahead window in weeks.
    #[serde(default = "default_weeks")]
    pub weeks: u64,
}

fn default_weeks() -> u64 {
    4
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            weeks: default_weeks(),
        }
    }
}

/// Breached password lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachConfig {
    /// Range API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    5
}

impl BreachConfig {
    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BreachConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout(),
        }
    }
}
