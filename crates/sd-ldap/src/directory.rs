//! Directory protocol port.
//!
//! Everything above this trait talks to the directory through a `&mut dyn
//! Directory` acquired for one logical operation. The production
//! implementation is [`crate::connection::LdapConnection`]; tests use
//! [`crate::memory::MemoryDirectory`].

use async_trait::async_trait;

use crate::entry::{LdapEntry, Modification};
use crate::error::{LdapError, LdapResult};
use crate::filter::Filter;

/// Attributes requested by default: all user attributes plus the
/// operational ones shown on user records.
pub const ALL_ATTRIBUTES: &[&str] = &["*", "modifiersName", "modifyTimestamp"];

/// Search depth below the base DN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchScope {
    /// Only the base entry.
    Base,
    /// Immediate children of the base.
    OneLevel,
    /// The base and all descendants.
    #[default]
    Subtree,
}

impl SearchScope {
    /// Converts to ldap3 scope.
    #[must_use]
    pub const fn to_ldap3(self) -> ldap3::Scope {
        match self {
            Self::Base => ldap3::Scope::Base,
            Self::OneLevel => ldap3::Scope::OneLevel,
            Self::Subtree => ldap3::Scope::Subtree,
        }
    }
}

/// A connection to the directory, scoped to one logical operation.
#[async_trait]
pub trait Directory: Send {
    /// Searches below `base`. A missing base yields no entries.
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        attrs: &[&str],
    ) -> LdapResult<Vec<LdapEntry>>;

    /// Creates an entry.
    async fn add(&mut self, entry: LdapEntry) -> LdapResult<()>;

    /// Applies attribute modifications to an entry, atomically.
    async fn modify(&mut self, dn: &str, mods: Vec<Modification>) -> LdapResult<()>;

    /// Renames an entry and optionally moves it below a new parent.
    async fn modify_dn(
        &mut self,
        dn: &str,
        new_rdn: &str,
        delete_old_rdn: bool,
        new_superior: Option<&str>,
    ) -> LdapResult<()>;

    /// Binds as `dn`. Returns `false` for invalid credentials.
    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<bool>;

    /// Searches for at most one entry.
    ///
    /// # Errors
    ///
    /// Returns `LdapError::AmbiguousEntry` if several entries match.
    async fn search_one(
        &mut self,
        base: &str,
        filter: &Filter,
        attrs: &[&str],
    ) -> LdapResult<Option<LdapEntry>> {
        let mut entries = self.search(base, SearchScope::Subtree, filter, attrs).await?;
        if entries.len() > 1 {
            return Err(LdapError::AmbiguousEntry(filter.render()));
        }
        Ok(entries.pop())
    }
}
