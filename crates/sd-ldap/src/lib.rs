//! # sd-ldap
//!
//! LDAP directory engine for the staff directory.
//!
//! This crate provides:
//! - Configuration of the directory layout, naming conventions and policies
//! - A typed filter builder and the [`Directory`] port with an `ldap3`
//!   connection pool and an in-memory implementation
//! - Mapping between directory entries and the staff directory model
//! - Numeric id allocation, username suggestions and uniqueness checks
//! - Minimal change sets for updates
//! - [`DirectoryService`], the account operations with read-through caching
//! - Maintenance reports over all users
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sd_auth::PwnedPasswordsClient;
//! use sd_ldap::{DirectoryService, LdapConfig, LdapConnectionPool};
//!
//! let config = Arc::new(LdapConfig::builder()
//!     .connection_url("ldaps://ldap.example.org:636")
//!     .bind_dn("cn=admin,dc=example,dc=org")
//!     .bind_credential(secret)
//!     .base_dn("dc=example,dc=org")
//!     .company("acme", "ACME Corp", "uid={uid},ou=users,ou=acme,dc=example,dc=org")
//!     .build()?);
//!
//! let pool = LdapConnectionPool::new((*config).clone())?;
//! let breach = PwnedPasswordsClient::new("https://api.pwnedpasswords.com", timeout)?;
//! let service = DirectoryService::new(config, Arc::new(breach));
//!
//! let mut conn = pool.get().await?;
//! let user = service.get_user_by_uid(&mut conn, "doejan").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocator;
pub mod changeset;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod connection;
pub mod directory;
pub mod entry;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod memory;
pub mod report;
pub mod search;
pub mod service;
pub mod suggest;
pub mod uniqueness;

pub use allocator::UidNumberAllocator;
pub use changeset::{AttributeChange, ChangeSet, Rename};
pub use classifier::GroupClassifier;
pub use config::{
    CacheConfig, DomainConfig, ExitDateBoundary, GroupPrefixes, LdapConfig, LdapConfigBuilder,
    MailPrefixScope, Permissions, Policy, UserDefaults,
};
pub use connection::{LdapConnection, LdapConnectionPool};
pub use directory::{Directory, SearchScope};
pub use entry::{LdapEntry, Modification};
pub use error::{LdapError, LdapResult};
pub use filter::Filter;
pub use mapper::AttributeMapper;
pub use memory::MemoryDirectory;
pub use report::{notify_expiring, notify_unmaintained, MaintenanceReport, ReportEntry};
pub use search::{DateRange, Projection, UserQuery};
pub use service::{DirectoryService, Listing, UserListing};
pub use uniqueness::UniquenessValidator;
