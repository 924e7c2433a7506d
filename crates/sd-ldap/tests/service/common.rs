//! Common test utilities and fixtures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use sd_auth::BreachCheck;
use sd_ldap::{
    DirectoryService, DomainConfig, LdapConfig, LdapEntry, MemoryDirectory, Permissions,
    UserDefaults,
};
use sd_model::User;

/// Directory base DN.
pub const BASE: &str = "dc=example,dc=org";
/// Group subtree.
pub const GROUPS: &str = "ou=groups,dc=example,dc=org";

/// Breach lookup with a switchable answer.
#[derive(Debug, Default)]
pub struct SwitchableBreach {
    pwned: AtomicBool,
}

impl SwitchableBreach {
    /// Makes every subsequent lookup report a breach.
    pub fn report_all(&self) {
        self.pwned.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BreachCheck for SwitchableBreach {
    async fn is_pwned(&self, _password: &str) -> bool {
        self.pwned.load(Ordering::SeqCst)
    }
}

/// Test environment with a seeded directory and a service on top of it.
pub struct TestEnv {
    /// Shared in-memory directory; clones see the same entries.
    pub dir: MemoryDirectory,
    /// Service under test.
    pub service: Arc<DirectoryService>,
    /// Breach lookup used by the service.
    pub breach: Arc<SwitchableBreach>,
}

impl TestEnv {
    /// Creates an environment with two users and a handful of groups.
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("sd_ldap=debug")
            .with_test_writer()
            .try_init();

        let breach = Arc::new(SwitchableBreach::default());
        let service = DirectoryService::new(Arc::new(config()), breach.clone());
        let dir = MemoryDirectory::new()
            .with_entry(person("doejan", "Jane", "Doe", 1001, "acme"))
            .with_entry(person("roejon", "John", "Roe", 1002, "acme"))
            .with_entry(posix_group("staff", &["doejan", "roejon"]))
            .with_entry(posix_group("externals", &[]))
            .with_entry(posix_group("team-web", &["doejan"]))
            .with_entry(posix_group("adm-web", &["roejon"]))
            .with_entry(posix_group("team-db", &[]))
            .with_entry(posix_group("ldap-admins", &["roejon"]))
            .with_entry(dn_group("wiki-editors", &[]));

        Self {
            dir,
            service: Arc::new(service),
            breach,
        }
    }

    /// Returns a stored user.
    pub async fn user(&mut self, uid: &str) -> anyhow::Result<User> {
        self.service
            .get_user_by_uid(&mut self.dir, uid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {uid} missing"))
    }
}

/// Configuration used by every test.
pub fn config() -> LdapConfig {
    let mut default_groups = BTreeMap::new();
    default_groups.insert("Employee".to_string(), vec!["staff".to_string()]);
    default_groups.insert("Contractor".to_string(), vec!["externals".to_string()]);

    LdapConfig::builder()
        .connection_url("ldaps://localhost:636")
        .bind_dn("cn=admin,dc=example,dc=org")
        .bind_credential("secret")
        .base_dn(BASE)
        .group_dn(GROUPS)
        .company("acme", "ACME Corp", "uid={uid},ou=users,ou=acme,dc=example,dc=org")
        .company("beta", "Beta Ltd", "uid={uid},ou=users,ou=beta,dc=example,dc=org")
        .domain(DomainConfig {
            primary: "example.org".to_string(),
            ..DomainConfig::default()
        })
        .permissions(Permissions {
            default_groups,
            user_admin_groups: vec!["hr".to_string()],
            ..Permissions::default()
        })
        .user_defaults(UserDefaults {
            samba_sid_prefix: "S-1-5-21-7-".to_string(),
            ..UserDefaults::default()
        })
        .build()
        .expect("valid test configuration")
}

/// Builds a user entry.
pub fn person(uid: &str, given: &str, sn: &str, uid_number: u32, company: &str) -> LdapEntry {
    LdapEntry::new(format!("uid={uid},ou=users,ou={company},{BASE}"))
        .with_attr("objectClass", ["inetOrgPerson", "posixAccount"])
        .with_attr("uid", [uid])
        .with_attr("uidNumber", [uid_number.to_string()])
        .with_attr("gidNumber", ["100"])
        .with_attr("givenName", [given])
        .with_attr("sn", [sn])
        .with_attr("cn", [format!("{given} {sn}")])
        .with_attr("mail", [sd_ldap::suggest::create_mail(given, sn, "example.org")])
        .with_attr("employeeNumber", [format!("EMP-{uid_number}")])
        .with_attr("description", ["Employee"])
        .with_attr("szzStatus", ["active"])
        .with_attr("szzMailStatus", ["active"])
        .with_attr("szzEntryDate", ["2020-01-01"])
        .with_attr("szzExitDate", ["2099-12-31"])
        .with_attr("userPassword", ["initial-secret"])
}

/// Builds a posixGroup entry whose members are uids.
pub fn posix_group(cn: &str, members: &[&str]) -> LdapEntry {
    LdapEntry::new(format!("cn={cn},{GROUPS}"))
        .with_attr("objectClass", ["top", "posixGroup"])
        .with_attr("cn", [cn])
        .with_attr("memberUid", members.iter().copied())
}

/// Builds a groupOfNames entry whose members are DNs.
pub fn dn_group(cn: &str, members: &[&str]) -> LdapEntry {
    LdapEntry::new(format!("cn={cn},{GROUPS}"))
        .with_attr("objectClass", ["top", "groupOfNames"])
        .with_attr("cn", [cn])
        .with_attr("member", members.iter().copied())
}

/// Returns a new user with the required dates set.
pub fn new_user(given: &str, sn: &str, company: &str) -> User {
    let entry = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let exit = NaiveDate::from_ymd_opt(2026, 12, 31).expect("valid date");
    User::new(given, sn, company)
        .with_employee_type("Employee")
        .with_dates(entry, exit)
}
