//! Directory service.
//!
//! [`DirectoryService`] composes the mapper, allocator, suggester,
//! uniqueness checks, change sets and caches into the public account
//! operations. Every operation receives the connection of the logical
//! operation it belongs to; the service never acquires one itself.
//!
//! ## Cache Invalidation
//!
//! Mutations invalidate the entries keyed by the affected uid or group cn
//! before returning, so a read after a committed write never sees stale
//! data:
//!
//! | operation | invalidated |
//! |---|---|
//! | insert | member info of the uid, uid list |
//! | update, activate, deactivate | member info of the uid |
//! | membership change | group by cn, member info of the uid |

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use sd_auth::{BreachCheck, PasswordChange, PasswordHashes, PasswordPolicy};
use sd_cache::{CacheProvider, MemoryCache};
use sd_core::{AccountError, AccountResult, AuditEvent, EventType};
use sd_model::{Group, GroupInfo, User, UserInfo, UserState};

use crate::allocator::UidNumberAllocator;
use crate::changeset::{AttributeChange, ChangeSet, Rename, USER_UPDATE_EXCLUDED};
use crate::config::LdapConfig;
use crate::directory::{Directory, SearchScope, ALL_ATTRIBUTES};
use crate::entry::Modification;
use crate::error::LdapError;
use crate::mapper::{attr, AttributeMapper};
use crate::search::{self, Projection, UserQuery};
use crate::suggest;
use crate::uniqueness::UniquenessValidator;

/// Code for failed reads and checks.
pub const LDAP_FAILED: &str = "general.ldap.failed";
/// Code for a missing user.
pub const USER_NOT_EXISTS: &str = "user.notExists";

const EMPLOYEE_NUMBER_RETRIES: usize = 20;

fn ldap_failed(err: LdapError) -> AccountError {
    err.into_account_error(LDAP_FAILED)
}

fn unknown_company(company_key: &str) -> AccountError {
    AccountError::validation("user.company.unknown").with_arg(company_key)
}

/// Returns the uid referenced by a member value, which is either a uid or
/// a DN whose leaf is `uid=<uid>`.
#[must_use]
pub fn member_uid(member: &str) -> &str {
    match member.get(..4) {
        Some(head) if head.eq_ignore_ascii_case("uid=") => {
            let rest = &member[4..];
            rest.split_once(',').map_or(rest, |(uid, _)| uid).trim()
        }
        _ => member,
    }
}

/// Distinct-value listings over all users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listing {
    /// Employment types.
    EmployeeTypes,
    /// Office locations.
    Locations,
    /// Departments.
    Departments,
}

impl Listing {
    /// Every listing.
    pub const ALL: [Self; 3] = [Self::EmployeeTypes, Self::Locations, Self::Departments];

    /// Returns the listed attribute.
    #[must_use]
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::EmployeeTypes => attr::DESCRIPTION,
            Self::Locations => attr::LOCATION,
            Self::Departments => attr::DEPARTMENT,
        }
    }
}

/// Result of a structured user query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UserListing {
    /// Reduced projection.
    Info(Vec<UserInfo>),
    /// Full records.
    Full(Vec<User>),
}

impl UserListing {
    /// Returns the number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Info(users) => users.len(),
            Self::Full(users) => users.len(),
        }
    }

    /// Returns whether no user matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Account operations against the directory.
pub struct DirectoryService {
    config: Arc<LdapConfig>,
    mapper: AttributeMapper,
    allocator: UidNumberAllocator,
    uniqueness: UniquenessValidator,
    passwords: PasswordPolicy,
    groups: MemoryCache<String, Group>,
    members: MemoryCache<String, UserInfo>,
    uids: MemoryCache<(), Vec<String>>,
    listings: MemoryCache<Listing, Vec<String>>,
}

impl std::fmt::Debug for DirectoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryService")
            .field("base_dn", &self.config.base_dn)
            .field("cached_groups", &self.groups.entry_count())
            .field("cached_members", &self.members.entry_count())
            .finish_non_exhaustive()
    }
}

impl DirectoryService {
    /// Creates a service for a configuration, checking new passwords
    /// against `breach`.
    #[must_use]
    pub fn new(config: Arc<LdapConfig>, breach: Arc<dyn BreachCheck>) -> Self {
        let entity = config.cache.entity_settings();
        let listing = config.cache.listing_settings();
        Self {
            mapper: AttributeMapper::new(Arc::clone(&config)),
            allocator: UidNumberAllocator::from_policy(&config.policy),
            uniqueness: UniquenessValidator::from_config(&config),
            passwords: PasswordPolicy::new(breach),
            groups: MemoryCache::new("groups", entity),
            members: MemoryCache::new("group_members", entity),
            uids: MemoryCache::new("uids", entity),
            listings: MemoryCache::new("listings", listing),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Returns the attribute mapper.
    #[must_use]
    pub const fn mapper(&self) -> &AttributeMapper {
        &self.mapper
    }

    // ========================================================================
    // User Reads
    // ========================================================================

    /// Looks up a user by login name.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails or matches several
    /// entries.
    pub async fn get_user_by_uid(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
    ) -> AccountResult<Option<User>> {
        let entry = conn
            .search_one(&self.config.base_dn, &search::user_by_uid(uid), ALL_ATTRIBUTES)
            .await
            .map_err(ldap_failed)?;
        if entry.is_none() {
            tracing::trace!(uid, "no user with uid");
        }
        Ok(entry.and_then(|e| self.mapper.user_from_entry(&e)))
    }

    /// Looks up a user by numeric id.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails or matches several
    /// entries.
    pub async fn get_user_by_uid_number(
        &self,
        conn: &mut dyn Directory,
        uid_number: u32,
    ) -> AccountResult<Option<User>> {
        let filter = search::user_by_uid_number(uid_number);
        let entry = conn
            .search_one(&self.config.base_dn, &filter, ALL_ATTRIBUTES)
            .await
            .map_err(ldap_failed)?;
        Ok(entry.and_then(|e| self.mapper.user_from_entry(&e)))
    }

    async fn require_user(&self, conn: &mut dyn Directory, uid: &str) -> AccountResult<User> {
        self.get_user_by_uid(conn, uid)
            .await?
            .ok_or_else(|| AccountError::not_found(USER_NOT_EXISTS).with_arg(uid))
    }

    async fn all_users(&self, conn: &mut dyn Directory) -> AccountResult<Vec<User>> {
        let entries = conn
            .search(
                &self.config.base_dn,
                SearchScope::Subtree,
                &search::all_users(),
                ALL_ATTRIBUTES,
            )
            .await
            .map_err(ldap_failed)?;
        let mut users = self.mapper.users_from_entries(&entries);
        users.sort_by(User::cmp_by_name);
        Ok(users)
    }

    /// Returns one page of users ordered by family name, given name and uid.
    /// Out-of-range bounds are clamped.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn get_users(
        &self,
        conn: &mut dyn Directory,
        first: usize,
        max: usize,
    ) -> AccountResult<Vec<User>> {
        let users = self.all_users(conn).await?;
        let start = first.min(users.len());
        let end = start.saturating_add(max).min(users.len());
        Ok(users[start..end].to_vec())
    }

    /// Returns the number of user entries.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn user_count(&self, conn: &mut dyn Directory) -> AccountResult<usize> {
        let entries = conn
            .search(
                &self.config.base_dn,
                SearchScope::Subtree,
                &search::all_users(),
                &[attr::UID],
            )
            .await
            .map_err(ldap_failed)?;
        Ok(entries.len())
    }

    /// Returns every uid, sorted. Cached until the next insert.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn all_uids(&self, conn: &mut dyn Directory) -> AccountResult<Vec<String>> {
        let base = self.config.base_dn.as_str();
        let uids = self
            .uids
            .get_or_try_insert_with((), move || async move {
                let entries = conn
                    .search(base, SearchScope::Subtree, &search::all_users(), &[attr::UID])
                    .await
                    .map_err(ldap_failed)?;
                let uids: BTreeSet<String> = entries
                    .iter()
                    .filter_map(|e| e.get_attr(attr::UID))
                    .map(str::to_string)
                    .collect();
                Ok::<_, AccountError>(Some(uids.into_iter().collect()))
            })
            .await?;
        Ok(uids.unwrap_or_default())
    }

    /// Finds users whose uid, names, mail or cn contain `term`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn find_user_by_search_term(
        &self,
        conn: &mut dyn Directory,
        term: &str,
    ) -> AccountResult<Vec<User>> {
        let entries = conn
            .search(
                &self.config.base_dn,
                SearchScope::Subtree,
                &search::users_by_search_term(term),
                ALL_ATTRIBUTES,
            )
            .await
            .map_err(ldap_failed)?;
        let mut users = self.mapper.users_from_entries(&entries);
        users.sort_by(User::cmp_by_name);
        Ok(users)
    }

    /// Runs a structured query.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn find_users(
        &self,
        conn: &mut dyn Directory,
        query: &UserQuery,
    ) -> AccountResult<UserListing> {
        let base = query.company.as_deref().map_or_else(
            || self.config.base_dn.clone(),
            |company| self.config.company_base(company),
        );
        let entries = conn
            .search(
                &base,
                SearchScope::Subtree,
                &query.filter(),
                query.projection.attributes(),
            )
            .await
            .map_err(ldap_failed)?;
        tracing::debug!(base = %base, found = entries.len(), "user query");

        let mut users = self.mapper.users_from_entries(&entries);
        users.sort_by(User::cmp_by_name);
        Ok(match query.projection {
            Projection::Info => UserListing::Info(users.iter().map(UserInfo::from).collect()),
            Projection::Full => UserListing::Full(users),
        })
    }

    // ========================================================================
    // Group Reads
    // ========================================================================

    async fn fetch_group(
        &self,
        conn: &mut dyn Directory,
        cn: &str,
    ) -> AccountResult<Option<Group>> {
        let entry = conn
            .search_one(self.config.group_base(), &search::group_by_cn(cn), ALL_ATTRIBUTES)
            .await
            .map_err(ldap_failed)?;
        match entry {
            Some(entry) => Ok(self.mapper.group_from_entry(&entry)),
            None => {
                tracing::warn!(cn, "no group with cn");
                Ok(None)
            }
        }
    }

    /// Looks up a group by common name. Cached; misses are cached for the
    /// negative lifetime.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails or matches several
    /// entries.
    pub async fn get_group_by_cn(
        &self,
        conn: &mut dyn Directory,
        cn: &str,
    ) -> AccountResult<Option<Group>> {
        self.groups
            .get_or_try_insert_with(cn.to_string(), move || self.fetch_group(conn, cn))
            .await
    }

    /// Returns every supported group, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn get_groups(&self, conn: &mut dyn Directory) -> AccountResult<Vec<Group>> {
        let entries = conn
            .search(
                self.config.group_base(),
                SearchScope::Subtree,
                &search::all_groups(),
                ALL_ATTRIBUTES,
            )
            .await
            .map_err(ldap_failed)?;
        Ok(self.mapper.groups_from_entries(&entries))
    }

    /// Returns the groups listing a user by uid or DN, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn get_groups_by_user(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
        dn: &str,
    ) -> AccountResult<Vec<Group>> {
        let entries = conn
            .search(
                self.config.group_base(),
                SearchScope::Subtree,
                &search::groups_by_user(uid, dn),
                ALL_ATTRIBUTES,
            )
            .await
            .map_err(ldap_failed)?;
        Ok(self.mapper.groups_from_entries(&entries))
    }

    /// Returns name, description and sorted members of every group.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn get_group_infos(&self, conn: &mut dyn Directory) -> AccountResult<Vec<GroupInfo>> {
        let groups = self.get_groups(conn).await?;
        Ok(groups.iter().map(GroupInfo::from).collect())
    }

    async fn get_group_member(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
    ) -> AccountResult<UserInfo> {
        let base = self.config.base_dn.as_str();
        let mapper = &self.mapper;
        let info = self
            .members
            .get_or_try_insert_with(uid.to_string(), move || async move {
                let entry = conn
                    .search_one(base, &search::user_by_uid(uid), search::INFO_ATTRIBUTES)
                    .await
                    .map_err(ldap_failed)?;
                Ok::<_, AccountError>(entry.and_then(|e| mapper.user_info_from_entry(&e)))
            })
            .await?;
        Ok(info.unwrap_or_else(|| UserInfo::unknown(uid)))
    }

    /// Returns the members of a group sorted by family and given name.
    /// Members without a directory entry appear as placeholders.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup fails.
    pub async fn get_group_members(
        &self,
        conn: &mut dyn Directory,
        group: &Group,
    ) -> AccountResult<Vec<UserInfo>> {
        let mut members = BTreeSet::new();
        for member in &group.member_ids {
            members.insert(self.get_group_member(conn, member_uid(member)).await?);
        }
        Ok(members.into_iter().collect())
    }

    /// Returns the full records of the members of a group. Members without
    /// an entry are skipped.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup fails.
    pub async fn get_users_by_group(
        &self,
        conn: &mut dyn Directory,
        group: &Group,
    ) -> AccountResult<Vec<User>> {
        let mut users = Vec::with_capacity(group.member_ids.len());
        for member in &group.member_ids {
            if let Some(user) = self.get_user_by_uid(conn, member_uid(member)).await? {
                users.push(user);
            }
        }
        users.sort_by(User::cmp_by_name);
        Ok(users)
    }

    /// Resolves the group whose members administer `group`.
    ///
    /// An admin group administers itself. A team group is administered by
    /// its admin counterpart if that exists and is classified as admin.
    /// Everything else falls back to the global admin group.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup fails.
    pub async fn get_admin_group(
        &self,
        conn: &mut dyn Directory,
        group: &Group,
    ) -> AccountResult<Option<Group>> {
        if group.is_admin() {
            return Ok(Some(group.clone()));
        }

        let classifier = self.mapper.classifier();
        if let Some(counterpart) = classifier.admin_counterpart(&group.cn) {
            if let Some(admin) = self.get_group_by_cn(conn, &counterpart).await? {
                if admin.is_admin() {
                    return Ok(Some(admin));
                }
            }
        }
        self.get_group_by_cn(conn, classifier.admin_group()).await
    }

    /// Returns the users administering a group.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup fails.
    pub async fn get_group_admins(
        &self,
        conn: &mut dyn Directory,
        group: &Group,
    ) -> AccountResult<Vec<User>> {
        match self.get_admin_group(conn, group).await? {
            Some(admin) => self.get_users_by_group(conn, &admin).await,
            None => Ok(Vec::new()),
        }
    }

    // ========================================================================
    // Group Membership
    // ========================================================================

    async fn change_membership(
        &self,
        conn: &mut dyn Directory,
        user: &User,
        cn: &str,
        join: bool,
    ) -> AccountResult<Option<Group>> {
        let Some(group) = self.fetch_group(conn, cn).await? else {
            return Ok(None);
        };
        if group.has_member(&user.uid, &user.dn) == join {
            tracing::debug!(uid = %user.uid, cn, join, "membership already in place");
            return Ok(Some(group));
        }

        let attribute = group.group_type.member_attribute().to_string();
        let value = vec![group.member_value(&user.uid, &user.dn).to_string()];
        let (modification, event) = if join {
            (Modification::Add(attribute, value), EventType::UserJoinedGroup)
        } else {
            (Modification::Delete(attribute, value), EventType::UserLeftGroup)
        };

        let result = conn.modify(&group.dn, vec![modification]).await;
        self.groups.invalidate(&group.cn).await;
        self.members.invalidate(&user.uid).await;
        if let Err(err) = result {
            let err = ldap_failed(err);
            AuditEvent::builder(event)
                .uid(&user.uid)
                .group(cn)
                .failure(err.code())
                .emit();
            return Err(err);
        }

        AuditEvent::builder(event).uid(&user.uid).group(cn).emit();
        self.get_group_by_cn(conn, cn).await
    }

    /// Adds a user to a group. Adding an existing member changes nothing
    /// and returns the current group.
    ///
    /// Returns `None` if the group does not exist.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup or the modify fails.
    pub async fn add_user_to_group(
        &self,
        conn: &mut dyn Directory,
        user: &User,
        cn: &str,
    ) -> AccountResult<Option<Group>> {
        self.change_membership(conn, user, cn, true).await
    }

    /// Removes a user from a group. Removing a non-member changes nothing
    /// and returns the current group.
    ///
    /// Returns `None` if the group does not exist.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup or the modify fails.
    pub async fn remove_user_from_group(
        &self,
        conn: &mut dyn Directory,
        user: &User,
        cn: &str,
    ) -> AccountResult<Option<Group>> {
        self.change_membership(conn, user, cn, false).await
    }

    /// Adds a user to the default groups of their employment type.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup or modify fails.
    pub async fn add_default_groups(
        &self,
        conn: &mut dyn Directory,
        user: &User,
    ) -> AccountResult<Vec<Group>> {
        let defaults = self.config.default_groups(&user.employee_type);
        if defaults.is_empty() {
            tracing::debug!(uid = %user.uid, "no default groups for employment type");
            return Ok(Vec::new());
        }
        let mut groups = Vec::with_capacity(defaults.len());
        for cn in defaults {
            if let Some(group) = self.add_user_to_group(conn, user, cn).await? {
                groups.push(group);
            }
        }
        tracing::debug!(uid = %user.uid, groups = ?defaults, "added default groups");
        Ok(groups)
    }

    /// Removes a user from groups: only from default groups of any
    /// employment type with `only_defaults`, otherwise from all groups.
    ///
    /// Returns the groups after removal.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup or modify fails.
    pub async fn clear_groups(
        &self,
        conn: &mut dyn Directory,
        user: &User,
        only_defaults: bool,
    ) -> AccountResult<Vec<Group>> {
        let defaults: BTreeSet<&str> = self
            .config
            .permissions
            .default_groups
            .values()
            .flatten()
            .map(String::as_str)
            .collect();

        let mut removed = Vec::new();
        for group in self.get_groups_by_user(conn, &user.uid, &user.dn).await? {
            if only_defaults && !defaults.contains(group.cn.as_str()) {
                continue;
            }
            if let Some(group) = self.remove_user_from_group(conn, user, &group.cn).await? {
                removed.push(group);
            }
        }
        tracing::debug!(
            uid = %user.uid,
            groups = ?removed.iter().map(|g| g.cn.as_str()).collect::<Vec<_>>(),
            "removed user from groups"
        );
        Ok(removed)
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    async fn member_cns(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
    ) -> AccountResult<BTreeSet<String>> {
        let Some(user) = self.get_user_by_uid(conn, uid).await? else {
            return Ok(BTreeSet::new());
        };
        let groups = self.get_groups_by_user(conn, &user.uid, &user.dn).await?;
        Ok(groups.into_iter().map(|g| g.cn).collect())
    }

    /// Returns whether a user belongs to the global admin group.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup fails.
    pub async fn is_admin(&self, conn: &mut dyn Directory, uid: &str) -> AccountResult<bool> {
        let cns = self.member_cns(conn, uid).await?;
        Ok(cns.contains(self.mapper.classifier().admin_group()))
    }

    /// Returns whether a user belongs to any user administration group.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup fails.
    pub async fn is_user_administrator(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
    ) -> AccountResult<bool> {
        let cns = self.member_cns(conn, uid).await?;
        Ok(self
            .config
            .permissions
            .user_admin_groups
            .iter()
            .any(|cn| cns.contains(cn)))
    }

    /// Returns whether a user may administer the group `cn`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a lookup fails.
    pub async fn is_group_admin(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
        cn: &str,
    ) -> AccountResult<bool> {
        let Some(required) = self.mapper.classifier().required_membership(cn) else {
            return Ok(false);
        };
        Ok(self.member_cns(conn, uid).await?.contains(&required))
    }

    // ========================================================================
    // Authentication and Passwords
    // ========================================================================

    /// Verifies a user's password with a simple bind.
    ///
    /// The bind changes the identity of `conn`; use a connection dedicated
    /// to the login. Blank passwords are rejected without a bind.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the lookup or the bind fails for another
    /// reason than invalid credentials.
    pub async fn authenticate(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
        password: &str,
    ) -> AccountResult<Option<User>> {
        if password.is_empty() {
            return Ok(None);
        }
        let Some(user) = self.get_user_by_uid(conn, uid).await? else {
            return Ok(None);
        };
        let bound = conn.bind(&user.dn, password).await.map_err(ldap_failed)?;
        if !bound {
            tracing::info!(uid, "authentication failed");
            return Ok(None);
        }
        tracing::debug!(uid, "authenticated");
        Ok(Some(user))
    }

    async fn write_password(
        &self,
        conn: &mut dyn Directory,
        user: &User,
        password: &str,
    ) -> AccountResult<()> {
        if self.config.policy.dev_mode {
            tracing::warn!(uid = %user.uid, "storing plaintext userPassword in development mode");
        }
        let hashes = PasswordHashes::compute(password, self.config.policy.dev_mode)?;
        let mods = vec![
            Modification::Replace(attr::USER_PASSWORD.to_string(), vec![hashes.user_password]),
            Modification::Replace(attr::SAMBA_NT_PASSWORD.to_string(), vec![hashes.nt_password]),
            Modification::Replace(
                attr::SAMBA_PWD_LAST_SET.to_string(),
                vec![Utc::now().timestamp().to_string()],
            ),
        ];
        conn.modify(&user.dn, mods)
            .await
            .map_err(|e| e.into_account_error("user.modify.failed"))
    }

    /// Replaces a user's password with a random one and returns it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown uid, or a protocol error.
    pub async fn reset_password(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
    ) -> AccountResult<String> {
        let user = self.require_user(conn, uid).await?;
        let password = sd_auth::hash::random_password();
        self.write_password(conn, &user, &password).await?;
        AuditEvent::builder(EventType::PasswordReset).uid(uid).emit();
        Ok(password)
    }

    /// Changes a user's password after validating the request.
    ///
    /// Validation runs completely before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `Validation` with a `password.*` code for a rejected
    /// password, `NotFound` for an unknown uid, or a protocol error.
    pub async fn change_password(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
        change: &PasswordChange<'_>,
    ) -> AccountResult<()> {
        let user = self.require_user(conn, uid).await?;
        let inputs = [
            user.uid.as_str(),
            user.given_name.as_str(),
            user.sn.as_str(),
            user.mail.as_str(),
        ];
        if let Err(err) = self.passwords.check(change, &inputs).await {
            tracing::info!(uid, code = err.code(), "password change rejected");
            return Err(err.into());
        }
        self.write_password(conn, &user, change.new_password).await?;
        AuditEvent::builder(EventType::PasswordChanged).uid(uid).emit();
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    async fn set_state(
        &self,
        conn: &mut dyn Directory,
        uid: &str,
        state: UserState,
    ) -> AccountResult<bool> {
        let Some(user) = self.get_user_by_uid(conn, uid).await? else {
            return Ok(false);
        };
        let value = vec![state.as_str().to_string()];
        let mods = vec![
            Modification::Replace(attr::STATUS.to_string(), value.clone()),
            Modification::Replace(attr::MAIL_STATUS.to_string(), value),
        ];
        let result = conn.modify(&user.dn, mods).await;
        self.members.invalidate(&user.uid).await;
        result.map_err(|e| e.into_account_error("user.modify.failed"))?;

        let event = if state.is_active() {
            EventType::UserActivated
        } else {
            EventType::UserDeactivated
        };
        AuditEvent::builder(event).uid(uid).emit();
        Ok(true)
    }

    /// Activates account and mailbox. Returns `false` for an unknown uid.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the lookup or modify fails.
    pub async fn activate(&self, conn: &mut dyn Directory, uid: &str) -> AccountResult<bool> {
        self.set_state(conn, uid, UserState::Active).await
    }

    /// Deactivates account and mailbox. Returns `false` for an unknown uid.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the lookup or modify fails.
    pub async fn deactivate(&self, conn: &mut dyn Directory, uid: &str) -> AccountResult<bool> {
        self.set_state(conn, uid, UserState::Inactive).await
    }

    async fn generate_employee_number(&self, conn: &mut dyn Directory) -> AccountResult<String> {
        for _ in 0..=EMPLOYEE_NUMBER_RETRIES {
            let candidate = Uuid::new_v4().to_string();
            if !self.uniqueness.employee_number_used(conn, &candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AccountError::exhausted("user.employeeNumber.cantFindUnique"))
    }

    async fn resolve_uid(
        &self,
        conn: &mut dyn Directory,
        requested: &str,
        candidates: &[String],
    ) -> AccountResult<String> {
        if !requested.is_empty() {
            if self.uniqueness.uid_used(conn, requested).await? {
                return Err(AccountError::uniqueness("user.create.username.alreadyUsed")
                    .with_arg(requested));
            }
            return Ok(requested.to_string());
        }
        for candidate in candidates {
            if !self.uniqueness.uid_used(conn, candidate).await? {
                return Ok(candidate.clone());
            }
            tracing::debug!(candidate = %candidate, "username suggestion taken");
        }
        Err(AccountError::exhausted("user.create.usernames.exceeded"))
    }

    /// Returns the username suggestions for a name that are still free.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unusable names, or a protocol error.
    pub async fn available_uids(
        &self,
        conn: &mut dyn Directory,
        given_name: &str,
        sn: &str,
    ) -> AccountResult<Vec<String>> {
        let mut free = Vec::new();
        for candidate in suggest::suggestions(given_name, sn)? {
            if !self.uniqueness.uid_used(conn, &candidate).await? {
                free.push(candidate);
            }
        }
        Ok(free)
    }

    fn validate_new_user(&self, user: &User) -> AccountResult<()> {
        if user.given_name.trim().is_empty() {
            return Err(AccountError::validation("user.firstname.required"));
        }
        if user.sn.trim().is_empty() {
            return Err(AccountError::validation("user.surname.required"));
        }
        if !user.uid.is_empty() && !suggest::is_valid_uid(&user.uid) {
            return Err(AccountError::validation("user.uid.invalid").with_arg(&user.uid));
        }
        if user.entry_date.is_none() {
            return Err(AccountError::validation("user.entry.required"));
        }
        if user.exit_date.is_none() {
            return Err(AccountError::validation("user.exit.required"));
        }
        if !self.config.user_dn_templates.contains_key(&user.company_key) {
            return Err(unknown_company(&user.company_key));
        }
        Ok(())
    }

    /// Creates a user.
    ///
    /// Input is validated first. Then a numeric id is allocated, the
    /// username resolved, mail and employee number checked, and the entry
    /// written in one add. A random password is set afterwards.
    ///
    /// # Errors
    ///
    /// - `Validation` for missing names, dates, an invalid uid or an
    ///   unknown company
    /// - `Uniqueness` if the uid, mail prefix or employee number is taken
    /// - `AllocationExhausted` if no numeric id, username or employee
    ///   number is free
    /// - `DirectoryProtocol` with `user.create.failed` if the add is
    ///   rejected
    pub async fn insert(&self, conn: &mut dyn Directory, user: User) -> AccountResult<User> {
        self.validate_new_user(&user)?;
        let requested = user.uid.trim().to_string();
        let candidates = if requested.is_empty() {
            suggest::suggestions(&user.given_name, &user.sn)?
        } else {
            Vec::new()
        };

        let uid_number = self.allocator.next(conn, &self.config.base_dn).await?;
        let uid = self.resolve_uid(conn, &requested, &candidates).await?;
        let draft = self.with_defaults(conn, user, uid, uid_number).await?;

        if self.uniqueness.mail_used(conn, &draft.mail).await? {
            return Err(
                AccountError::uniqueness("user.mail.alreadyUsed").with_arg(draft.mail_prefix())
            );
        }
        if self.uniqueness.employee_number_used(conn, &draft.employee_number).await? {
            return Err(AccountError::uniqueness("user.employeeNumber.alreadyUsed")
                .with_arg(&draft.employee_number));
        }

        if let Err(err) = conn.add(self.mapper.user_to_entry(&draft)).await {
            tracing::warn!(dn = %draft.dn, uid = %draft.uid, uid_number, "new user rejected");
            let err = err.into_account_error("user.create.failed");
            AuditEvent::builder(EventType::UserCreated)
                .uid(&draft.uid)
                .failure(err.code())
                .emit();
            return Err(err);
        }
        self.members.invalidate(&draft.uid).await;
        self.uids.invalidate(&()).await;
        AuditEvent::builder(EventType::UserCreated)
            .uid(&draft.uid)
            .detail("dn", &draft.dn)
            .detail("uidNumber", uid_number.to_string())
            .emit();
        tracing::info!(uid = %draft.uid, dn = %draft.dn, "user created");

        self.reset_password(conn, &draft.uid).await?;
        self.require_user(conn, &draft.uid).await
    }

    async fn with_defaults(
        &self,
        conn: &mut dyn Directory,
        user: User,
        uid: String,
        uid_number: u32,
    ) -> AccountResult<User> {
        let defaults = &self.config.user_defaults;
        let dn = self
            .config
            .user_dn(&uid, &user.company_key)
            .ok_or_else(|| unknown_company(&user.company_key))?;
        let employee_number = if user.employee_number.trim().is_empty() {
            self.generate_employee_number(conn).await?
        } else {
            user.employee_number.trim().to_string()
        };
        let mail = if user.mail.trim().is_empty() {
            self.create_mail(&user.given_name, &user.sn, &user.employee_type)
        } else {
            user.mail.trim().to_string()
        };
        let cn = user.full_name();

        Ok(User {
            dn,
            home_directory: format!("{}{uid}", defaults.home_directory_prefix),
            samba_sid: format!("{}{}", defaults.samba_sid_prefix, u64::from(uid_number) * 2 + 1000),
            display_name: format!("{cn} ({})", user.company_key.to_lowercase()),
            gecos: suggest::asciify(&cn),
            organization: self.config.company_name(&user.company_key).to_string(),
            login_shell: if user.login_shell.trim().is_empty() {
                defaults.login_shell.clone()
            } else {
                user.login_shell.clone()
            },
            samba_acct_flags: if user.samba_acct_flags.trim().is_empty() {
                defaults.samba_acct_flags.clone()
            } else {
                user.samba_acct_flags.clone()
            },
            samba_password_history: if user.samba_password_history.trim().is_empty() {
                "0".repeat(64)
            } else {
                user.samba_password_history.clone()
            },
            uid,
            uid_number: Some(uid_number),
            employee_number,
            mail,
            cn,
            ..user
        })
    }

    /// Applies the differences between the stored and the desired record.
    ///
    /// The uid identifies the user and is never changed. Derived attributes
    /// (numeric id, display name, home directory, SID, mail) are ignored. A
    /// changed company moves the entry to the company's subtree. A changed
    /// employment type moves default group membership.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown uid
    /// - `Validation` for an unknown target company
    /// - `Uniqueness` if a new employee number is taken
    /// - `DirectoryProtocol` with `user.modify.failed` if a write is rejected
    pub async fn update(&self, conn: &mut dyn Directory, desired: User) -> AccountResult<User> {
        let current = self.require_user(conn, &desired.uid).await?;

        let rename = if current.company_key == desired.company_key {
            None
        } else {
            let new_dn = self
                .config
                .user_dn(&current.uid, &desired.company_key)
                .ok_or_else(|| unknown_company(&desired.company_key))?;
            Some(Rename::to(new_dn))
        };

        let mut target = desired;
        target.organization = self.config.company_name(&target.company_key).to_string();
        let mut changes = ChangeSet::between(
            &self.mapper.user_to_attributes(&current),
            &self.mapper.user_to_attributes(&target),
            &USER_UPDATE_EXCLUDED,
        )
        .with_rename(rename);

        if target.employee_number != current.employee_number {
            let number = if target.employee_number.trim().is_empty() {
                self.generate_employee_number(conn).await?
            } else if self
                .uniqueness
                .employee_number_used(conn, &target.employee_number)
                .await?
            {
                return Err(AccountError::uniqueness("user.modify.employeeNumber.alreadyUsed")
                    .with_arg(&target.employee_number));
            } else {
                target.employee_number.clone()
            };
            changes.set(AttributeChange {
                attribute: attr::EMPLOYEE_NUMBER.to_string(),
                old: vec![current.employee_number.clone()],
                new: vec![number],
            });
        }

        if changes.is_empty() {
            tracing::debug!(uid = %current.uid, "update without changes");
            return Ok(current);
        }
        self.apply_changes(conn, &current, &changes).await?;

        let updated = self.require_user(conn, &current.uid).await?;
        if updated.employee_type != current.employee_type {
            let active = updated.is_active();
            self.clear_groups(conn, &updated, active).await?;
            if active {
                self.add_default_groups(conn, &updated).await?;
            }
        }
        Ok(updated)
    }

    async fn apply_changes(
        &self,
        conn: &mut dyn Directory,
        current: &User,
        changes: &ChangeSet,
    ) -> AccountResult<()> {
        let modifications = changes.modifications();
        let changed: Vec<&str> = changes.changes.iter().map(|c| c.attribute.as_str()).collect();

        let result = async {
            if !modifications.is_empty() {
                conn.modify(&current.dn, modifications).await?;
            }
            if let Some(rename) = &changes.rename {
                tracing::warn!(from = %current.dn, to = %rename.new_dn, "moving user");
                conn.modify_dn(&current.dn, &rename.new_rdn, true, Some(&rename.new_superior))
                    .await?;
            }
            Ok::<_, LdapError>(())
        }
        .await;
        self.members.invalidate(&current.uid).await;

        if let Err(err) = result {
            let err = err.into_account_error("user.modify.failed");
            AuditEvent::builder(EventType::UserUpdated)
                .uid(&current.uid)
                .failure(err.code())
                .emit();
            return Err(err);
        }

        if !changed.is_empty() {
            AuditEvent::builder(EventType::UserUpdated)
                .uid(&current.uid)
                .detail("attributes", changed.join(","))
                .emit();
        }
        if let Some(rename) = &changes.rename {
            AuditEvent::builder(EventType::UserMoved)
                .uid(&current.uid)
                .detail("from", &current.dn)
                .detail("to", &rename.new_dn)
                .emit();
        }
        Ok(())
    }

    // ========================================================================
    // Mail Addresses and Listings
    // ========================================================================

    /// Returns the mail domain of an employment type.
    #[must_use]
    pub fn mail_domain(&self, employee_type: &str) -> String {
        self.config.mail_domain(employee_type)
    }

    /// Builds the default mail address for a name and employment type.
    #[must_use]
    pub fn create_mail(&self, given_name: &str, sn: &str, employee_type: &str) -> String {
        suggest::create_mail(given_name, sn, &self.mail_domain(employee_type))
    }

    /// Returns the distinct, trimmed, non-blank values of a listing,
    /// sorted. Cached with the listing lifetime.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn listing(
        &self,
        conn: &mut dyn Directory,
        listing: Listing,
    ) -> AccountResult<Vec<String>> {
        let base = self.config.base_dn.as_str();
        let attribute = listing.attribute();
        let values = self
            .listings
            .get_or_try_insert_with(listing, move || async move {
                let entries = conn
                    .search(base, SearchScope::Subtree, &search::all_users(), &[attribute])
                    .await
                    .map_err(ldap_failed)?;
                let values: BTreeSet<String> = entries
                    .iter()
                    .filter_map(|e| e.get_attr(attribute))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect();
                tracing::debug!(attribute, count = values.len(), "listing loaded");
                Ok::<_, AccountError>((!values.is_empty()).then(|| values.into_iter().collect()))
            })
            .await?;
        Ok(values.unwrap_or_default())
    }

    /// Returns the employment types in use.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn employee_types(&self, conn: &mut dyn Directory) -> AccountResult<Vec<String>> {
        self.listing(conn, Listing::EmployeeTypes).await
    }

    /// Returns the office locations in use.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn locations(&self, conn: &mut dyn Directory) -> AccountResult<Vec<String>> {
        self.listing(conn, Listing::Locations).await
    }

    /// Returns the departments in use.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the search fails.
    pub async fn departments(&self, conn: &mut dyn Directory) -> AccountResult<Vec<String>> {
        self.listing(conn, Listing::Departments).await
    }

    /// Drops the listing caches.
    pub async fn flush_listings(&self) {
        self.listings.invalidate_all().await;
    }
}
