//! Directory entry mapping.
//!
//! Maps LDAP entries to the staff directory model and back. Entries that
//! lack required attributes are logged and skipped rather than failing the
//! surrounding operation.

use std::sync::Arc;

use sd_model::{Group, GroupType, User, UserInfo, UserState, UNKNOWN};

use crate::classifier::GroupClassifier;
use crate::codec::{self, AttributeMap};
use crate::config::LdapConfig;
use crate::entry::LdapEntry;

/// Attribute names.
pub mod attr {
    /// Object classes.
    pub const OBJECT_CLASS: &str = "objectClass";
    /// Login name.
    pub const UID: &str = "uid";
    /// Numeric user id.
    pub const UID_NUMBER: &str = "uidNumber";
    /// Primary group id.
    pub const GID_NUMBER: &str = "gidNumber";
    /// Given name.
    pub const GIVEN_NAME: &str = "givenName";
    /// Family name.
    pub const SN: &str = "sn";
    /// Display name.
    pub const DISPLAY_NAME: &str = "displayName";
    /// ASCII full name.
    pub const GECOS: &str = "gecos";
    /// Common name.
    pub const CN: &str = "cn";
    /// Home directory.
    pub const HOME_DIRECTORY: &str = "homeDirectory";
    /// Login shell.
    pub const LOGIN_SHELL: &str = "loginShell";
    /// Day of birth.
    pub const BIRTH_DAY: &str = "szzBirthDay";
    /// Month of birth.
    pub const BIRTH_MONTH: &str = "szzBirthMonth";
    /// Samba SID.
    pub const SAMBA_SID: &str = "sambaSID";
    /// Samba password history.
    pub const SAMBA_PASSWORD_HISTORY: &str = "sambaPasswordHistory";
    /// Samba account flags.
    pub const SAMBA_ACCT_FLAGS: &str = "sambaAcctFlags";
    /// Epoch seconds of the last password change.
    pub const SAMBA_PWD_LAST_SET: &str = "sambaPwdLastSet";
    /// Legacy NT hash.
    pub const SAMBA_NT_PASSWORD: &str = "sambaNTPassword";
    /// Password hash.
    pub const USER_PASSWORD: &str = "userPassword";
    /// Mail address.
    pub const MAIL: &str = "mail";
    /// Account state.
    pub const STATUS: &str = "szzStatus";
    /// Mailbox state.
    pub const MAIL_STATUS: &str = "szzMailStatus";
    /// First working day.
    pub const ENTRY_DATE: &str = "szzEntryDate";
    /// Last working day.
    pub const EXIT_DATE: &str = "szzExitDate";
    /// Department.
    pub const DEPARTMENT: &str = "ou";
    /// Employment type on users, free text on groups.
    pub const DESCRIPTION: &str = "description";
    /// Job title.
    pub const TITLE: &str = "title";
    /// Location.
    pub const LOCATION: &str = "l";
    /// Organization name.
    pub const ORGANIZATION: &str = "o";
    /// Employee number.
    pub const EMPLOYEE_NUMBER: &str = "employeeNumber";
    /// Landline number.
    pub const TELEPHONE_NUMBER: &str = "telephoneNumber";
    /// Mobile number.
    pub const MOBILE: &str = "mobile";
    /// SSH public key.
    pub const PUBLIC_KEY: &str = "szzPublicKey";
    /// External account identifiers.
    pub const EXTERNAL_ACCOUNTS: &str = "szzExternalAccounts";
    /// Last modifier (operational).
    pub const MODIFIERS_NAME: &str = "modifiersName";
    /// Last modification time (operational).
    pub const MODIFY_TIMESTAMP: &str = "modifyTimestamp";
}

/// Object classes of user entries.
pub const USER_OBJECT_CLASSES: [&str; 6] = [
    "person",
    "organizationalPerson",
    "inetOrgPerson",
    "posixAccount",
    "sambaSamAccount",
    "szzUser",
];

/// Attributes a user entry must carry to be mapped.
pub const REQUIRED_USER_ATTRIBUTES: [&str; 5] =
    [attr::UID, attr::UID_NUMBER, attr::GIVEN_NAME, attr::SN, attr::MAIL];

/// Returns the company key of a DN: the value of its last `ou` component
/// below the leaf.
#[must_use]
pub fn company_key_for_dn(dn: &str) -> Option<&str> {
    dn.split(',')
        .skip(1)
        .filter_map(|component| component.trim().split_once('='))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("ou"))
        .map(|(_, value)| value.trim())
        .last()
}

/// Maps between LDAP entries and domain objects.
#[derive(Debug, Clone)]
pub struct AttributeMapper {
    config: Arc<LdapConfig>,
    classifier: GroupClassifier,
}

impl AttributeMapper {
    /// Creates a mapper for a configuration.
    #[must_use]
    pub fn new(config: Arc<LdapConfig>) -> Self {
        let classifier = GroupClassifier::new(config.group_prefixes.clone(), &config.permissions);
        Self { config, classifier }
    }

    /// Returns the group classifier.
    #[must_use]
    pub const fn classifier(&self) -> &GroupClassifier {
        &self.classifier
    }

    /// Returns the company key and display name for a DN.
    #[must_use]
    pub fn company_for_dn(&self, dn: &str) -> (String, String) {
        match company_key_for_dn(dn) {
            Some(key) => (key.to_string(), self.config.company_name(key).to_string()),
            None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        }
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    /// Maps an entry to a user, or `None` if required attributes are missing.
    #[must_use]
    pub fn user_from_entry(&self, entry: &LdapEntry) -> Option<User> {
        let missing: Vec<&str> = REQUIRED_USER_ATTRIBUTES
            .into_iter()
            .filter(|name| !entry.has_attr(name))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(dn = %entry.dn, ?missing, "failed to map user entry");
            return None;
        }
        let Some(uid_number) = codec::unsigned(entry, attr::UID_NUMBER) else {
            tracing::warn!(dn = %entry.dn, "failed to map user entry: invalid uidNumber");
            return None;
        };

        let (company_key, organization) = self.company_for_dn(&entry.dn);
        let defaults = &self.config.user_defaults;
        let external = entry.get_attr(attr::EXTERNAL_ACCOUNTS);

        Some(User {
            dn: entry.dn.clone(),
            uid: codec::string(entry, attr::UID),
            uid_number: Some(uid_number),
            employee_number: codec::string(entry, attr::EMPLOYEE_NUMBER),
            given_name: codec::string(entry, attr::GIVEN_NAME),
            sn: codec::string(entry, attr::SN),
            cn: codec::string(entry, attr::CN),
            display_name: codec::string(entry, attr::DISPLAY_NAME),
            gecos: codec::string(entry, attr::GECOS),
            gid_number: codec::unsigned(entry, attr::GID_NUMBER).unwrap_or(defaults.gid_number),
            home_directory: codec::string(entry, attr::HOME_DIRECTORY),
            login_shell: entry
                .get_attr(attr::LOGIN_SHELL)
                .unwrap_or(&defaults.login_shell)
                .to_string(),
            samba_sid: codec::string(entry, attr::SAMBA_SID),
            samba_password_history: codec::string(entry, attr::SAMBA_PASSWORD_HISTORY),
            samba_acct_flags: codec::string(entry, attr::SAMBA_ACCT_FLAGS),
            samba_pwd_last_set: codec::signed(entry, attr::SAMBA_PWD_LAST_SET).unwrap_or(0),
            mail: codec::string(entry, attr::MAIL),
            status: UserState::parse(&codec::string(entry, attr::STATUS)),
            mail_status: UserState::parse(&codec::string(entry, attr::MAIL_STATUS)),
            company_key,
            organization,
            department: codec::string(entry, attr::DEPARTMENT),
            employee_type: codec::string(entry, attr::DESCRIPTION),
            title: codec::string(entry, attr::TITLE),
            location: codec::string(entry, attr::LOCATION),
            entry_date: codec::date(entry, attr::ENTRY_DATE),
            exit_date: codec::date(entry, attr::EXIT_DATE),
            birth_day: codec::birth_part(entry, attr::BIRTH_DAY),
            birth_month: codec::birth_part(entry, attr::BIRTH_MONTH),
            telephone_number: codec::string(entry, attr::TELEPHONE_NUMBER),
            mobile: codec::string(entry, attr::MOBILE),
            public_key: codec::string(entry, attr::PUBLIC_KEY),
            external_accounts: codec::decode_map(external, &defaults.external_account_keys),
            modifiers_name: codec::string(entry, attr::MODIFIERS_NAME),
            modify_timestamp: codec::string(entry, attr::MODIFY_TIMESTAMP),
        })
    }

    /// Maps an entry to the reduced user projection.
    #[must_use]
    pub fn user_info_from_entry(&self, entry: &LdapEntry) -> Option<UserInfo> {
        self.user_from_entry(entry).as_ref().map(UserInfo::from)
    }

    /// Maps every mappable entry to a user.
    #[must_use]
    pub fn users_from_entries(&self, entries: &[LdapEntry]) -> Vec<User> {
        entries.iter().filter_map(|e| self.user_from_entry(e)).collect()
    }

    /// Serializes the writable attributes of a user.
    ///
    /// The DN, company key, password data and operational attributes are not
    /// part of the map. Blank values are omitted.
    #[must_use]
    pub fn user_to_attributes(&self, user: &User) -> AttributeMap {
        let mut map = AttributeMap::new();
        codec::put_all(&mut map, attr::OBJECT_CLASS, USER_OBJECT_CLASSES);
        codec::put(&mut map, attr::UID, user.uid.as_str());
        if let Some(uid_number) = user.uid_number {
            codec::put(&mut map, attr::UID_NUMBER, uid_number.to_string());
        }
        codec::put(&mut map, attr::GID_NUMBER, user.gid_number.to_string());
        codec::put(&mut map, attr::GIVEN_NAME, user.given_name.as_str());
        codec::put(&mut map, attr::SN, user.sn.as_str());
        codec::put(&mut map, attr::DISPLAY_NAME, user.display_name.as_str());
        codec::put(&mut map, attr::GECOS, user.gecos.as_str());
        codec::put(&mut map, attr::CN, user.cn.as_str());
        codec::put(&mut map, attr::HOME_DIRECTORY, user.home_directory.as_str());
        codec::put(&mut map, attr::LOGIN_SHELL, user.login_shell.as_str());
        codec::put(&mut map, attr::BIRTH_DAY, codec::encode_birth_part(user.birth_day));
        codec::put(&mut map, attr::BIRTH_MONTH, codec::encode_birth_part(user.birth_month));
        codec::put(&mut map, attr::SAMBA_SID, user.samba_sid.as_str());
        codec::put(&mut map, attr::SAMBA_PASSWORD_HISTORY, user.samba_password_history.as_str());
        codec::put(&mut map, attr::SAMBA_ACCT_FLAGS, user.samba_acct_flags.as_str());
        codec::put(&mut map, attr::MAIL, user.mail.as_str());
        codec::put(&mut map, attr::STATUS, user.status.as_str());
        codec::put(&mut map, attr::MAIL_STATUS, user.mail_status.as_str());
        if let Some(date) = user.entry_date {
            codec::put(&mut map, attr::ENTRY_DATE, codec::format_date(date));
        }
        if let Some(date) = user.exit_date {
            codec::put(&mut map, attr::EXIT_DATE, codec::format_date(date));
        }
        codec::put(&mut map, attr::DEPARTMENT, user.department.as_str());
        codec::put(&mut map, attr::DESCRIPTION, user.employee_type.as_str());
        codec::put(&mut map, attr::TELEPHONE_NUMBER, user.telephone_number.as_str());
        codec::put(&mut map, attr::MOBILE, user.mobile.as_str());
        codec::put(&mut map, attr::EMPLOYEE_NUMBER, user.employee_number.as_str());
        codec::put(&mut map, attr::TITLE, user.title.as_str());
        codec::put(&mut map, attr::LOCATION, user.location.as_str());
        codec::put(&mut map, attr::PUBLIC_KEY, user.public_key.as_str());
        codec::put(&mut map, attr::EXTERNAL_ACCOUNTS, codec::encode_map(&user.external_accounts));
        codec::put(&mut map, attr::ORGANIZATION, user.organization.as_str());
        map
    }

    /// Builds the entry written when creating a user.
    #[must_use]
    pub fn user_to_entry(&self, user: &User) -> LdapEntry {
        LdapEntry {
            dn: user.dn.clone(),
            attributes: self.user_to_attributes(user).into_iter().collect(),
        }
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    /// Maps an entry to a group, or `None` for unsupported entries.
    #[must_use]
    pub fn group_from_entry(&self, entry: &LdapEntry) -> Option<Group> {
        let Some(group_type) = GroupType::from_object_classes(entry.object_classes()) else {
            tracing::debug!(dn = %entry.dn, "skipping entry of unsupported group type");
            return None;
        };
        let Some(cn) = entry.get_attr(attr::CN) else {
            tracing::warn!(dn = %entry.dn, "failed to map group entry: missing cn");
            return None;
        };

        let mut group = Group::new(entry.dn.clone(), cn, group_type)
            .with_description(codec::string(entry, attr::DESCRIPTION))
            .with_classification(self.classifier.classify(cn));
        if let Some(gid) = codec::unsigned(entry, attr::GID_NUMBER) {
            group = group.with_gid_number(gid);
        }
        group.member_ids = entry
            .get_attrs(group_type.member_attribute())
            .cloned()
            .unwrap_or_default();
        Some(group)
    }

    /// Maps every supported entry to a group, sorted by name.
    #[must_use]
    pub fn groups_from_entries(&self, entries: &[LdapEntry]) -> Vec<Group> {
        let mut groups: Vec<Group> = entries
            .iter()
            .filter_map(|e| self.group_from_entry(e))
            .collect();
        groups.sort_by(Group::cmp_by_name);
        groups
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use sd_model::GroupClassification;

    use super::*;
    use crate::config::UserDefaults;

    const DN: &str = "uid=doejan,ou=users,ou=acme,dc=example,dc=org";

    fn mapper() -> AttributeMapper {
        let config = LdapConfig::builder()
            .connection_url("ldaps://ldap.example.org")
            .bind_dn("cn=admin,dc=example,dc=org")
            .bind_credential("secret")
            .base_dn("dc=example,dc=org")
            .company("acme", "ACME Corp", "uid={uid},ou=users,ou=acme,dc=example,dc=org")
            .user_defaults(UserDefaults {
                external_account_keys: vec!["github".to_string()],
                ..UserDefaults::default()
            })
            .build()
            .unwrap();
        AttributeMapper::new(Arc::new(config))
    }

    fn user_entry() -> LdapEntry {
        LdapEntry::new(DN)
            .with_attr("objectClass", USER_OBJECT_CLASSES)
            .with_attr("uid", ["doejan"])
            .with_attr("uidNumber", ["1042"])
            .with_attr("gidNumber", ["100"])
            .with_attr("givenName", ["Jane"])
            .with_attr("sn", ["Doe"])
            .with_attr("cn", ["Jane Doe"])
            .with_attr("mail", ["jane.doe@example.org"])
            .with_attr("szzStatus", ["active"])
            .with_attr("szzEntryDate", ["2024-02-01"])
            .with_attr("szzBirthDay", ["-1"])
            .with_attr("description", ["Employee"])
            .with_attr("szzExternalAccounts", ["jira=jdoe"])
    }

    #[test]
    fn company_is_last_ou_below_leaf() {
        assert_eq!(company_key_for_dn(DN), Some("acme"));
        assert_eq!(company_key_for_dn("ou=acme,dc=example"), None);
        assert_eq!(company_key_for_dn("uid=x,dc=example"), None);

        let (key, name) = mapper().company_for_dn(DN);
        assert_eq!((key.as_str(), name.as_str()), ("acme", "ACME Corp"));
        let (key, name) = mapper().company_for_dn("uid=x,dc=example");
        assert_eq!((key.as_str(), name.as_str()), (UNKNOWN, UNKNOWN));
    }

    #[test]
    fn maps_user_entry() {
        let user = mapper().user_from_entry(&user_entry()).unwrap();
        assert_eq!(user.uid, "doejan");
        assert_eq!(user.uid_number, Some(1042));
        assert_eq!(user.company_key, "acme");
        assert_eq!(user.organization, "ACME Corp");
        assert_eq!(user.status, UserState::Active);
        assert_eq!(user.mail_status, UserState::Inactive);
        assert_eq!(user.entry_date, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(user.exit_date, None);
        assert_eq!(user.birth_day, None);
        assert_eq!(user.login_shell, "/bin/false");
        assert_eq!(
            user.external_accounts,
            BTreeMap::from([
                ("github".to_string(), String::new()),
                ("jira".to_string(), "jdoe".to_string()),
            ])
        );
    }

    #[test]
    fn missing_required_attribute_skips_entry() {
        let mut entry = user_entry();
        entry.attributes.remove("mail");
        assert!(mapper().user_from_entry(&entry).is_none());
    }

    #[test]
    fn attributes_round_trip_through_entry() {
        let mapper = mapper();
        let user = mapper.user_from_entry(&user_entry()).unwrap();
        let attrs = mapper.user_to_attributes(&user);

        assert_eq!(attrs["objectClass"].len(), 6);
        assert_eq!(attrs["szzBirthDay"], ["-1"]);
        assert_eq!(attrs["szzExternalAccounts"], ["jira=jdoe"]);
        assert!(!attrs.contains_key("title"));
        assert!(!attrs.contains_key("modifiersName"));

        let entry = mapper.user_to_entry(&user);
        let again = mapper.user_from_entry(&entry).unwrap();
        assert_eq!(mapper.user_to_attributes(&again), attrs);
    }

    #[test]
    fn maps_groups_of_every_type() {
        let mapper = mapper();
        let posix = LdapEntry::new("cn=team-web,ou=groups,dc=example,dc=org")
            .with_attr("objectClass", ["top", "posixGroup"])
            .with_attr("cn", ["team-web"])
            .with_attr("gidNumber", ["5001"])
            .with_attr("memberUid", ["doejan"]);
        let names = LdapEntry::new("cn=adm-web,ou=groups,dc=example,dc=org")
            .with_attr("objectClass", ["top", "groupOfNames"])
            .with_attr("cn", ["adm-web"])
            .with_attr("member", [DN]);
        let unsupported = LdapEntry::new("ou=groups,dc=example,dc=org")
            .with_attr("objectClass", ["organizationalUnit"]);

        let groups = mapper.groups_from_entries(&[posix, names, unsupported]);
        assert_eq!(groups.len(), 2);

        let posix = groups.iter().find(|g| g.cn == "team-web").unwrap();
        assert_eq!(posix.group_type, GroupType::Posix);
        assert_eq!(posix.gid_number, Some(5001));
        assert_eq!(posix.classification, GroupClassification::Team);
        assert!(posix.has_member("doejan", DN));

        let names = groups.iter().find(|g| g.cn == "adm-web").unwrap();
        assert_eq!(names.group_type, GroupType::GroupOfNames);
        assert!(names.is_admin());
        assert!(names.has_member("doejan", DN));
    }
}
