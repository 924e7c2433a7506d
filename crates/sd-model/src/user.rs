//! User domain model.
//!
//! A [`User`] is the full employee identity record as stored in the
//! directory: POSIX account data, Samba account data, organizational fields
//! and lifecycle dates. [`UserInfo`] is the reduced projection used for
//! member listings.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder used for unresolvable references.
pub const UNKNOWN: &str = "UNKNOWN";

/// Default POSIX group id for new users.
pub const DEFAULT_GID_NUMBER: u32 = 100;

/// Default login shell for new users.
pub const DEFAULT_LOGIN_SHELL: &str = "/bin/false";

/// Activation state of an account or mailbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    /// Enabled.
    Active,
    /// Disabled.
    #[default]
    Inactive,
}

impl UserState {
    /// Parses a stored state; anything other than `active` is inactive.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("active") {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Returns whether the state is active.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An employee identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    // === Identity ===
    /// Distinguished name, derived from uid and company on insert.
    #[serde(default)]
    pub dn: String,
    /// Login name.
    #[serde(default)]
    pub uid: String,
    /// Numeric user id, allocated on insert.
    pub uid_number: Option<u32>,
    /// Employee number, a UUID unless set explicitly.
    #[serde(default)]
    pub employee_number: String,

    // === Names ===
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub sn: String,
    /// Common name, `<given> <sn>`.
    #[serde(default)]
    pub cn: String,
    /// Display name, `<given> <sn> (<company>)`.
    #[serde(default)]
    pub display_name: String,
    /// ASCII-only full name.
    #[serde(default)]
    pub gecos: String,

    // === POSIX ===
    /// Primary group id.
    pub gid_number: u32,
    /// Home directory.
    #[serde(default)]
    pub home_directory: String,
    /// Login shell.
    pub login_shell: String,

    // === Samba ===
    /// Samba security identifier.
    #[serde(default)]
    pub samba_sid: String,
    /// Samba password history.
    #[serde(default)]
    pub samba_password_history: String,
    /// Samba account flags.
    #[serde(default)]
    pub samba_acct_flags: String,
    /// Epoch seconds of the last password change.
    #[serde(default)]
    pub samba_pwd_last_set: i64,

    // === Mail and status ===
    /// Mail address.
    #[serde(default)]
    pub mail: String,
    /// Account state.
    #[serde(default)]
    pub status: UserState,
    /// Mailbox state.
    #[serde(default)]
    pub mail_status: UserState,

    // === Organization ===
    /// Company key, selects the subtree the entry lives in.
    pub company_key: String,
    /// Company display name.
    #[serde(default)]
    pub organization: String,
    /// Department (`ou`).
    #[serde(default)]
    pub department: String,
    /// Employment type (`description`).
    #[serde(default)]
    pub employee_type: String,
    /// Job title.
    #[serde(default)]
    pub title: String,
    /// Office location (`l`).
    #[serde(default)]
    pub location: String,

    // === Lifecycle ===
    /// First working day.
    pub entry_date: Option<NaiveDate>,
    /// Last working day.
    pub exit_date: Option<NaiveDate>,
    /// Day of birth.
    pub birth_day: Option<u8>,
    /// Month of birth.
    pub birth_month: Option<u8>,

    // === Contact ===
    /// Landline number.
    #[serde(default)]
    pub telephone_number: String,
    /// Mobile number.
    #[serde(default)]
    pub mobile: String,
    /// SSH public key.
    #[serde(default)]
    pub public_key: String,
    /// External account identifiers by service.
    #[serde(default)]
    pub external_accounts: BTreeMap<String, String>,

    // === Operational (read only) ===
    /// DN of the last modifier.
    #[serde(default)]
    pub modifiers_name: String,
    /// Last modification timestamp.
    #[serde(default)]
    pub modify_timestamp: String,
}

impl User {
    /// Creates a draft user with defaults for every derived field.
    #[must_use]
    pub fn new(
        given_name: impl Into<String>,
        sn: impl Into<String>,
        company_key: impl Into<String>,
    ) -> Self {
        Self {
            dn: String::new(),
            uid: String::new(),
            uid_number: None,
            employee_number: String::new(),
            given_name: given_name.into(),
            sn: sn.into(),
            cn: String::new(),
            display_name: String::new(),
            gecos: String::new(),
            gid_number: DEFAULT_GID_NUMBER,
            home_directory: String::new(),
            login_shell: DEFAULT_LOGIN_SHELL.to_string(),
            samba_sid: String::new(),
            samba_password_history: "0".repeat(64),
            samba_acct_flags: String::new(),
            samba_pwd_last_set: 0,
            mail: String::new(),
            status: UserState::Inactive,
            mail_status: UserState::Inactive,
            company_key: company_key.into(),
            organization: String::new(),
            department: String::new(),
            employee_type: String::new(),
            title: String::new(),
            location: String::new(),
            entry_date: None,
            exit_date: None,
            birth_day: None,
            birth_month: None,
            telephone_number: String::new(),
            mobile: String::new(),
            public_key: String::new(),
            external_accounts: BTreeMap::new(),
            modifiers_name: String::new(),
            modify_timestamp: String::new(),
        }
    }

    /// Sets the login name.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Sets the employment type.
    #[must_use]
    pub fn with_employee_type(mut self, employee_type: impl Into<String>) -> Self {
        self.employee_type = employee_type.into();
        self
    }

    /// Sets the entry and exit dates.
    #[must_use]
    pub const fn with_dates(mut self, entry: NaiveDate, exit: NaiveDate) -> Self {
        self.entry_date = Some(entry);
        self.exit_date = Some(exit);
        self
    }

    /// Sets account and mailbox state together.
    #[must_use]
    pub const fn with_state(mut self, state: UserState) -> Self {
        self.status = state;
        self.mail_status = state;
        self
    }

    /// Returns `<given> <sn>`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.sn)
    }

    /// Returns the local part of the mail address.
    #[must_use]
    pub fn mail_prefix(&self) -> &str {
        self.mail
            .split_once('@')
            .map_or(self.mail.as_str(), |(prefix, _)| prefix)
    }

    /// Returns whether the account is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Orders users by family name, given name, then uid.
    #[must_use]
    pub fn cmp_by_name(&self, other: &Self) -> Ordering {
        self.sn
            .cmp(&other.sn)
            .then_with(|| self.given_name.cmp(&other.given_name))
            .then_with(|| self.uid.cmp(&other.uid))
    }
}

/// Reduced user projection for listings and group member views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserInfo {
    /// Distinguished name.
    pub dn: String,
    /// Login name.
    pub uid: String,
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub sn: String,
    /// Company display name.
    pub organization: String,
    /// Mail address.
    pub mail: String,
    /// Account state.
    pub status: UserState,
    /// Employment type.
    pub employee_type: String,
}

impl UserInfo {
    /// Returns the placeholder shown for a uid without a directory entry.
    #[must_use]
    pub fn unknown(uid: impl Into<String>) -> Self {
        Self {
            dn: UNKNOWN.to_string(),
            uid: uid.into(),
            given_name: UNKNOWN.to_string(),
            sn: UNKNOWN.to_string(),
            organization: UNKNOWN.to_string(),
            mail: UNKNOWN.to_string(),
            status: UserState::Inactive,
            employee_type: UNKNOWN.to_string(),
        }
    }

    /// Returns whether this is the placeholder for a missing entry.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.dn == UNKNOWN
    }
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            dn: user.dn.clone(),
            uid: user.uid.clone(),
            given_name: user.given_name.clone(),
            sn: user.sn.clone(),
            organization: user.organization.clone(),
            mail: user.mail.clone(),
            status: user.status,
            employee_type: user.employee_type.clone(),
        }
    }
}

impl Ord for UserInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sn
            .cmp(&other.sn)
            .then_with(|| self.given_name.cmp(&other.given_name))
            .then_with(|| self.uid.cmp(&other.uid))
            .then_with(|| self.dn.cmp(&other.dn))
            .then_with(|| self.mail.cmp(&other.mail))
            .then_with(|| self.organization.cmp(&other.organization))
            .then_with(|| self.employee_type.cmp(&other.employee_type))
            .then_with(|| self.status.as_str().cmp(other.status.as_str()))
    }
}

impl PartialOrd for UserInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
