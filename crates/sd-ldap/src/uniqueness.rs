//! Directory-wide uniqueness checks.

use sd_core::AccountResult;

use crate::config::{LdapConfig, MailPrefixScope};
use crate::directory::{Directory, SearchScope};
use crate::filter::Filter;
use crate::mapper::attr;
use crate::search;

/// Checks whether identifying values are already taken.
#[derive(Debug, Clone)]
pub struct UniquenessValidator {
    base: String,
    mail_scope: MailPrefixScope,
}

impl UniquenessValidator {
    /// Creates a validator searching below `base`.
    #[must_use]
    pub fn new(base: impl Into<String>, mail_scope: MailPrefixScope) -> Self {
        Self {
            base: base.into(),
            mail_scope,
        }
    }

    /// Creates a validator from the configuration.
    #[must_use]
    pub fn from_config(config: &LdapConfig) -> Self {
        Self::new(config.base_dn.clone(), config.policy.mail_prefix_scope)
    }

    async fn any_match(
        &self,
        conn: &mut dyn Directory,
        filter: &Filter,
        attribute: &str,
    ) -> AccountResult<bool> {
        let found = conn
            .search(&self.base, SearchScope::Subtree, filter, &[attribute])
            .await
            .map_err(|e| e.into_account_error("general.ldap.failed"))?;
        Ok(!found.is_empty())
    }

    /// Returns whether any user has `attribute` equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn is_used(
        &self,
        conn: &mut dyn Directory,
        attribute: &str,
        value: &str,
    ) -> AccountResult<bool> {
        self.any_match(conn, &search::attribute_used(attribute, value), attribute)
            .await
    }

    /// Returns whether a login name is taken.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn uid_used(&self, conn: &mut dyn Directory, uid: &str) -> AccountResult<bool> {
        self.is_used(conn, attr::UID, uid).await
    }

    /// Returns whether an employee number is taken.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn employee_number_used(
        &self,
        conn: &mut dyn Directory,
        number: &str,
    ) -> AccountResult<bool> {
        self.is_used(conn, attr::EMPLOYEE_NUMBER, number).await
    }

    /// Returns whether a mail address collides with an existing one.
    ///
    /// With the global scope any address sharing the local part collides;
    /// otherwise only the exact address does.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn mail_used(&self, conn: &mut dyn Directory, mail: &str) -> AccountResult<bool> {
        match self.mail_scope {
            MailPrefixScope::Global => {
                let prefix = mail.split_once('@').map_or(mail, |(prefix, _)| prefix);
                self.any_match(conn, &search::mail_prefix_used(prefix), attr::MAIL)
                    .await
            }
            MailPrefixScope::PerDomain => self.is_used(conn, attr::MAIL, mail).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use sd_core::AccountError;

    use super::*;
    use crate::entry::LdapEntry;
    use crate::memory::MemoryDirectory;

    const BASE: &str = "dc=example,dc=org";

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new().with_entry(
            LdapEntry::new(format!("uid=doejan,ou=users,{BASE}"))
                .with_attr("objectClass", ["inetOrgPerson", "posixAccount"])
                .with_attr("uid", ["doejan"])
                .with_attr("mail", ["jane.doe@example.org"])
                .with_attr("employeeNumber", ["42"]),
        )
    }

    #[tokio::test]
    async fn exact_attributes() {
        let mut dir = directory();
        let validator = UniquenessValidator::new(BASE, MailPrefixScope::Global);

        assert!(validator.uid_used(&mut dir, "doejan").await.unwrap());
        assert!(!validator.uid_used(&mut dir, "doejo").await.unwrap());
        assert!(validator.employee_number_used(&mut dir, "42").await.unwrap());
        assert!(!validator.employee_number_used(&mut dir, "43").await.unwrap());
    }

    #[tokio::test]
    async fn global_mail_scope_matches_local_part() {
        let mut dir = directory();
        let validator = UniquenessValidator::new(BASE, MailPrefixScope::Global);

        assert!(validator.mail_used(&mut dir, "jane.doe@other.org").await.unwrap());
        assert!(!validator.mail_used(&mut dir, "jane.do@example.org").await.unwrap());
    }

    #[tokio::test]
    async fn per_domain_mail_scope_matches_full_address() {
        let mut dir = directory();
        let validator = UniquenessValidator::new(BASE, MailPrefixScope::PerDomain);

        assert!(validator.mail_used(&mut dir, "jane.doe@example.org").await.unwrap());
        assert!(!validator.mail_used(&mut dir, "jane.doe@other.org").await.unwrap());
    }

    #[tokio::test]
    async fn search_failure_is_a_protocol_error() {
        let mut dir = directory();
        dir.fail_on("search", 1, "operations error");
        let validator = UniquenessValidator::new(BASE, MailPrefixScope::Global);

        let err = validator.uid_used(&mut dir, "doejan").await.unwrap_err();
        assert!(matches!(err, AccountError::DirectoryProtocol(_)));
        assert_eq!(err.code(), "general.ldap.failed");
    }
}
