//! Directory configuration.
//!
//! ## Security Requirements
//!
//! Connection URLs must start with `ldaps://`. Plain `ldap://` is accepted
//! only with `policy.dev_mode`, which is meant for local test directories.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sd_cache::CacheSettings;

use crate::error::{LdapError, LdapResult};

/// Placeholder for the uid in user DN templates.
pub const UID_PLACEHOLDER: &str = "{uid}";

// ============================================================================
// Naming Conventions
// ============================================================================

/// Group naming prefixes that drive classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPrefixes {
    /// Prefix of administrative groups.
    #[serde(default = "default_admin_prefix")]
    pub admin: String,
    /// Prefix of team groups.
    #[serde(default = "default_team_prefix")]
    pub team: String,
    /// Prefix of technical groups.
    #[serde(default = "default_technical_prefix")]
    pub technical: String,
}

fn default_admin_prefix() -> String {
    "adm".to_string()
}

fn default_team_prefix() -> String {
    "team".to_string()
}

fn default_technical_prefix() -> String {
    "tech".to_string()
}

impl Default for GroupPrefixes {
    fn default() -> Self {
        Self {
            admin: default_admin_prefix(),
            team: default_team_prefix(),
            technical: default_technical_prefix(),
        }
    }
}

/// Groups that grant permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// The single global admin group.
    #[serde(default = "default_admin_group")]
    pub admin_group: String,
    /// Groups whose members may administer users.
    #[serde(default)]
    pub user_admin_groups: Vec<String>,
    /// Groups every user of an employment type belongs to.
    #[serde(default)]
    pub default_groups: BTreeMap<String, Vec<String>>,
}

fn default_admin_group() -> String {
    "ldap-admins".to_string()
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            admin_group: default_admin_group(),
            user_admin_groups: Vec::new(),
            default_groups: BTreeMap::new(),
        }
    }
}

/// Mail domains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Primary mail domain.
    pub primary: String,
    /// Public-facing domain.
    #[serde(default)]
    pub public: String,
    /// Subdomain per employment type, prepended to the primary domain.
    #[serde(default)]
    pub subdomains: BTreeMap<String, String>,
}

/// Defaults applied to new users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDefaults {
    /// Primary POSIX group id.
    #[serde(default = "default_gid_number")]
    pub gid_number: u32,
    /// Login shell.
    #[serde(default = "default_login_shell")]
    pub login_shell: String,
    /// Prefix the uid is appended to for the home directory.
    #[serde(default = "default_home_prefix")]
    pub home_directory_prefix: String,
    /// Domain SID the relative id is appended to.
    #[serde(default)]
    pub samba_sid_prefix: String,
    /// Samba account flags.
    #[serde(default = "default_samba_flags")]
    pub samba_acct_flags: String,
    /// External account keys every user carries, empty until set.
    #[serde(default)]
    pub external_account_keys: Vec<String>,
}

fn default_gid_number() -> u32 {
    sd_model::user::DEFAULT_GID_NUMBER
}

fn default_login_shell() -> String {
    sd_model::user::DEFAULT_LOGIN_SHELL.to_string()
}

fn default_home_prefix() -> String {
    "/home/".to_string()
}

fn default_samba_flags() -> String {
    "[U          ]".to_string()
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            gid_number: default_gid_number(),
            login_shell: default_login_shell(),
            home_directory_prefix: default_home_prefix(),
            samba_sid_prefix: String::new(),
            samba_acct_flags: default_samba_flags(),
            external_account_keys: Vec::new(),
        }
    }
}

// ============================================================================
// Policies
// ============================================================================

/// Scope of the mail local-part uniqueness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailPrefixScope {
    /// `name@a` and `name@b` collide.
    #[default]
    Global,
    /// Only the full address must be unique.
    PerDomain,
}

/// Whether a user whose exit date is today already counts as exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitDateBoundary {
    /// Exited only once the exit date lies before today.
    #[default]
    Exclusive,
    /// Exited on the exit date itself.
    Inclusive,
}

/// Tunable behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Mail uniqueness scope.
    #[serde(default)]
    pub mail_prefix_scope: MailPrefixScope,
    /// Exit date boundary for maintenance reports.
    #[serde(default)]
    pub exit_date_boundary: ExitDateBoundary,
    /// Lowest numeric user id ever handed out.
    #[serde(default = "default_uid_number_floor")]
    pub uid_number_floor: u32,
    /// Candidates probed per allocation.
    #[serde(default = "default_uid_number_probes")]
    pub uid_number_probes: u32,
    /// Allows `ldap://` and plaintext `userPassword` values.
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_uid_number_floor() -> u32 {
    1000
}

fn default_uid_number_probes() -> u32 {
    1000
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            mail_prefix_scope: MailPrefixScope::default(),
            exit_date_boundary: ExitDateBoundary::default(),
            uid_number_floor: default_uid_number_floor(),
            uid_number_probes: default_uid_number_probes(),
            dev_mode: false,
        }
    }
}

/// Cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of negative entries in seconds.
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl_secs: u64,
    /// Lifetime of listing caches in seconds.
    #[serde(default = "default_listing_ttl")]
    pub listing_ttl_secs: u64,
}

fn default_negative_ttl() -> u64 {
    sd_cache::DEFAULT_NEGATIVE_TTL.as_secs()
}

fn default_listing_ttl() -> u64 {
    sd_cache::DAILY.as_secs()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            negative_ttl_secs: default_negative_ttl(),
            listing_ttl_secs: default_listing_ttl(),
        }
    }
}

impl CacheConfig {
    /// Settings for caches invalidated only by mutations.
    #[must_use]
    pub const fn entity_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: None,
            negative_ttl: Duration::from_secs(self.negative_ttl_secs),
        }
    }

    /// Settings for listing caches with a daily flush.
    #[must_use]
    pub const fn listing_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Some(Duration::from_secs(self.listing_ttl_secs)),
            negative_ttl: Duration::from_secs(self.negative_ttl_secs),
        }
    }
}

// ============================================================================
// LDAP Configuration
// ============================================================================

/// Directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    // === Connection ===
    /// LDAP server URL.
    pub connection_url: String,

    /// Bind DN for the service account.
    pub bind_dn: String,

    /// Bind credential.
    #[serde(default, skip_serializing)]
    pub bind_credential: String,

    /// Whether to validate server certificates.
    #[serde(default = "default_true")]
    pub validate_certificates: bool,

    /// Maximum concurrent connections.
    #[serde(default = "default_pool_size")]
    pub pool_max_size: usize,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    // === Directory Structure ===
    /// Base DN of all user searches.
    pub base_dn: String,

    /// Base DN of group searches; defaults to the base DN.
    #[serde(default)]
    pub group_dn: Option<String>,

    /// User DN template per company key, containing `{uid}`.
    #[serde(default)]
    pub user_dn_templates: BTreeMap<String, String>,

    /// Company display name per company key.
    #[serde(default)]
    pub companies: BTreeMap<String, String>,

    // === Conventions ===
    /// Group naming prefixes.
    #[serde(default)]
    pub group_prefixes: GroupPrefixes,

    /// Permission groups.
    #[serde(default)]
    pub permissions: Permissions,

    /// Mail domains.
    #[serde(default)]
    pub domain: DomainConfig,

    /// New-user defaults.
    #[serde(default)]
    pub user_defaults: UserDefaults,

    /// Tunable policies.
    #[serde(default)]
    pub policy: Policy,

    /// Cache lifetimes.
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> usize {
    8
}

fn default_connect_timeout() -> u64 {
    10
}

impl LdapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LdapConfigBuilder {
        LdapConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `LdapError::InsecureProtocol` for a plain URL outside
    /// development mode, and `LdapError::Configuration` for missing values.
    pub fn validate(&self) -> LdapResult<()> {
        self.validate_url(&self.connection_url)?;

        if self.bind_dn.is_empty() {
            return Err(LdapError::config("bind_dn cannot be empty"));
        }
        if self.base_dn.is_empty() {
            return Err(LdapError::config("base_dn cannot be empty"));
        }
        if self.pool_max_size == 0 {
            return Err(LdapError::config("pool_max_size must be positive"));
        }
        if self.policy.uid_number_probes == 0 {
            return Err(LdapError::config("uid_number_probes must be positive"));
        }
        for (company, template) in &self.user_dn_templates {
            if !template.contains(UID_PLACEHOLDER) {
                return Err(LdapError::config(format!(
                    "user DN template for '{company}' lacks {UID_PLACEHOLDER}"
                )));
            }
        }
        Ok(())
    }

    fn validate_url(&self, url: &str) -> LdapResult<()> {
        let url_lower = url.to_lowercase();
        let rest = if let Some(rest) = url_lower.strip_prefix("ldaps://") {
            rest
        } else if let Some(rest) = url_lower.strip_prefix("ldap://") {
            if !self.policy.dev_mode {
                return Err(LdapError::InsecureProtocol);
            }
            rest
        } else {
            return Err(LdapError::InsecureProtocol);
        };

        if rest.is_empty() {
            return Err(LdapError::config("Invalid LDAP URL: missing host"));
        }
        Ok(())
    }

    /// Returns the base DN of group searches.
    #[must_use]
    pub fn group_base(&self) -> &str {
        self.group_dn.as_deref().unwrap_or(&self.base_dn)
    }

    /// Returns the search base of one company subtree.
    #[must_use]
    pub fn company_base(&self, company_key: &str) -> String {
        format!("ou={company_key},{}", self.base_dn)
    }

    /// Builds the DN of a user in a company subtree.
    #[must_use]
    pub fn user_dn(&self, uid: &str, company_key: &str) -> Option<String> {
        self.user_dn_templates
            .get(company_key)
            .map(|template| template.replace(UID_PLACEHOLDER, uid))
    }

    /// Returns the display name of a company.
    #[must_use]
    pub fn company_name(&self, company_key: &str) -> &str {
        self.companies
            .get(company_key)
            .map_or(sd_model::UNKNOWN, String::as_str)
    }

    /// Returns the mail domain for an employment type.
    #[must_use]
    pub fn mail_domain(&self, employee_type: &str) -> String {
        match self.domain.subdomains.get(employee_type) {
            Some(sub) if !sub.is_empty() => format!("{sub}.{}", self.domain.primary),
            _ => self.domain.primary.clone(),
        }
    }

    /// Returns the default groups of an employment type.
    #[must_use]
    pub fn default_groups(&self, employee_type: &str) -> &[String] {
        self.permissions
            .default_groups
            .get(employee_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for directory configuration.
#[derive(Debug, Default)]
pub struct LdapConfigBuilder {
    connection_url: Option<String>,
    bind_dn: Option<String>,
    bind_credential: Option<String>,
    base_dn: Option<String>,
    group_dn: Option<String>,
    validate_certificates: bool,
    pool_max_size: usize,
    connect_timeout_secs: u64,
    user_dn_templates: BTreeMap<String, String>,
    companies: BTreeMap<String, String>,
    group_prefixes: GroupPrefixes,
    permissions: Permissions,
    domain: DomainConfig,
    user_defaults: UserDefaults,
    policy: Policy,
    cache: CacheConfig,
}

impl LdapConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            validate_certificates: true,
            pool_max_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout(),
            ..Self::default()
        }
    }

    /// Sets the connection URL.
    #[must_use]
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    /// Sets the service account DN.
    #[must_use]
    pub fn bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    /// Sets the service account credential.
    #[must_use]
    pub fn bind_credential(mut self, credential: impl Into<String>) -> Self {
        self.bind_credential = Some(credential.into());
        self
    }

    /// Sets the base DN.
    #[must_use]
    pub fn base_dn(mut self, dn: impl Into<String>) -> Self {
        self.base_dn = Some(dn.into());
        self
    }

    /// Sets the group base DN.
    #[must_use]
    pub fn group_dn(mut self, dn: impl Into<String>) -> Self {
        self.group_dn = Some(dn.into());
        self
    }

    /// Sets certificate validation.
    #[must_use]
    pub const fn validate_certificates(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn pool_size(mut self, max: usize) -> Self {
        self.pool_max_size = max;
        self
    }

    /// Registers a company with its display name and user DN template.
    #[must_use]
    pub fn company(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        user_dn_template: impl Into<String>,
    ) -> Self {
        let key = key.into();
        self.companies.insert(key.clone(), name.into());
        self.user_dn_templates.insert(key, user_dn_template.into());
        self
    }

    /// Sets the group prefixes.
    #[must_use]
    pub fn group_prefixes(mut self, prefixes: GroupPrefixes) -> Self {
        self.group_prefixes = prefixes;
        self
    }

    /// Sets the permission groups.
    #[must_use]
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Sets the mail domains.
    #[must_use]
    pub fn domain(mut self, domain: DomainConfig) -> Self {
        self.domain = domain;
        self
    }

    /// Sets the new-user defaults.
    #[must_use]
    pub fn user_defaults(mut self, defaults: UserDefaults) -> Self {
        self.user_defaults = defaults;
        self
    }

    /// Sets the policies.
    #[must_use]
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the cache lifetimes.
    #[must_use]
    pub const fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required fields are missing
    /// - The connection URL is not allowed
    pub fn build(self) -> LdapResult<LdapConfig> {
        let config = LdapConfig {
            connection_url: self
                .connection_url
                .ok_or_else(|| LdapError::config("connection_url is required"))?,
            bind_dn: self
                .bind_dn
                .ok_or_else(|| LdapError::config("bind_dn is required"))?,
            bind_credential: self
                .bind_credential
                .ok_or_else(|| LdapError::config("bind_credential is required"))?,
            validate_certificates: self.validate_certificates,
            pool_max_size: self.pool_max_size,
            connect_timeout_secs: self.connect_timeout_secs,
            base_dn: self
                .base_dn
                .ok_or_else(|| LdapError::config("base_dn is required"))?,
            group_dn: self.group_dn,
            user_dn_templates: self.user_dn_templates,
            companies: self.companies,
            group_prefixes: self.group_prefixes,
            permissions: self.permissions,
            domain: self.domain,
            user_defaults: self.user_defaults,
            policy: self.policy,
            cache: self.cache,
        };

        config.validate()?;
        Ok(config)
    }
}
