//! Command implementations.
//!
//! Every command runs against a `&mut dyn Directory`, so the pooled
//! connection used by the binary and the in-memory directory used in tests
//! go through the same code.

pub mod group;
pub mod listing;
pub mod report;
pub mod status;
pub mod user;

pub use group::run_group;
pub use listing::run_listing;
pub use report::run_report;
pub use status::run_status;
pub use user::run_user;

use std::sync::Arc;

use sd_auth::PwnedPasswordsClient;
use sd_ldap::{DirectoryService, LdapConnectionPool};

use crate::CliConfig;

/// Connection pool and service built from the configuration.
#[derive(Debug)]
pub struct Session {
    /// Pooled directory connections.
    pub pool: LdapConnectionPool,
    /// Engine operating on those connections.
    pub service: DirectoryService,
}

impl Session {
    /// Builds the pool and the service.
    pub fn open(config: &CliConfig) -> crate::CliResult<Self> {
        let ldap = config.directory()?;
        let breach = PwnedPasswordsClient::new(&config.breach.api_url, config.breach.timeout())?;
        let service = DirectoryService::new(Arc::new(ldap.clone()), Arc::new(breach));
        tracing::debug!(url = %ldap.connection_url, "opening directory session");
        let pool = LdapConnectionPool::new(ldap)?;
        Ok(Self { pool, service })
    }
}
