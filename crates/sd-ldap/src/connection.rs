//! LDAP connection pool management.
//!
//! ## Security Requirements
//!
//! Connections use LDAPS (TLS from connection start) unless the
//! configuration enables development mode. STARTTLS is NOT supported to
//! prevent downgrade attacks.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, SearchEntry, SearchResult};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::LdapConfig;
use crate::directory::{Directory, SearchScope};
use crate::entry::{LdapEntry, Modification};
use crate::error::{LdapError, LdapResult, RC_INVALID_CREDENTIALS, RC_NO_SUCH_OBJECT};
use crate::filter::Filter;

/// Connection pool for LDAP connections.
///
/// At most `pool_max_size` connections are handed out at once. Idle
/// connections bound as the service account are kept for reuse.
pub struct LdapConnectionPool {
    config: Arc<LdapConfig>,
    semaphore: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<Ldap>>>,
}

impl std::fmt::Debug for LdapConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnectionPool")
            .field("url", &self.config.connection_url)
            .field("available", &self.semaphore.available_permits())
            .finish_non_exhaustive()
    }
}

impl LdapConnectionPool {
    /// Creates a new connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: LdapConfig) -> LdapResult<Self> {
        config.validate()?;
        let max_size = config.pool_max_size;
        Ok(Self {
            config: Arc::new(config),
            semaphore: Arc::new(Semaphore::new(max_size)),
            idle: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Gets a connection from the pool.
    ///
    /// The connection returns to the pool when dropped, unless it was
    /// re-bound as another identity or hit a transport failure.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be established or bound.
    pub async fn get(&self) -> LdapResult<LdapConnection> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LdapError::PoolExhausted)?;

        let reused = self.idle.lock().pop();
        let ldap = match reused {
            Some(ldap) => ldap,
            None => self.create_connection().await?,
        };

        Ok(LdapConnection {
            ldap: Some(ldap),
            idle: Arc::clone(&self.idle),
            rebound: false,
            broken: false,
            _permit: permit,
        })
    }

    /// Creates a new connection bound as the service account.
    async fn create_connection(&self) -> LdapResult<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connect_timeout())
            .set_no_tls_verify(!self.config.validate_certificates);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.connection_url)
            .await
            .map_err(|e| LdapError::connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "LDAP connection driver error");
            }
        });

        ldap.simple_bind(&self.config.bind_dn, &self.config.bind_credential)
            .await
            .map_err(|e| LdapError::Bind(e.to_string()))?
            .success()
            .map_err(|e| LdapError::Bind(e.to_string()))?;

        tracing::debug!(url = %self.config.connection_url, "LDAP connection established");
        Ok(ldap)
    }

    /// Tests the connection by reading the base entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unreachable or the base is missing.
    pub async fn test_connection(&self) -> LdapResult<()> {
        let mut conn = self.get().await?;
        let base = self.config.base_dn.clone();
        let found = conn
            .search(&base, SearchScope::Base, &Filter::present("objectClass"), &["1.1"])
            .await?;
        if found.is_empty() {
            return Err(LdapError::connection(format!("base DN '{base}' not found")));
        }
        Ok(())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }
}

/// A connection from the pool.
pub struct LdapConnection {
    ldap: Option<Ldap>,
    idle: Arc<Mutex<Vec<Ldap>>>,
    rebound: bool,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl LdapConnection {
    fn ldap_mut(&mut self) -> LdapResult<&mut Ldap> {
        self.ldap
            .as_mut()
            .ok_or_else(|| LdapError::connection("connection already released"))
    }

    /// Marks the connection broken when `result` failed below the protocol
    /// level. Server result codes leave it usable.
    fn track<T>(&mut self, result: LdapResult<T>) -> LdapResult<T> {
        if let Err(err) = &result {
            if err.is_connection_error() && !self.broken {
                tracing::debug!(error = %err, "dropping broken LDAP connection");
                self.broken = true;
            }
        }
        result
    }

    /// Returns whether the connection may go back to the idle stack.
    const fn reusable(&self) -> bool {
        !self.rebound && !self.broken
    }

    /// Consumes the connection without returning it to the pool.
    pub async fn discard(mut self) {
        if let Some(mut ldap) = self.ldap.take() {
            let _ = ldap.unbind().await;
        }
    }
}

impl Drop for LdapConnection {
    fn drop(&mut self) {
        if !self.reusable() {
            return;
        }
        if let Some(ldap) = self.ldap.take() {
            self.idle.lock().push(ldap);
        }
    }
}

#[async_trait]
impl Directory for LdapConnection {
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        attrs: &[&str],
    ) -> LdapResult<Vec<LdapEntry>> {
        let filter = filter.render();
        tracing::trace!(base, filter = %filter, "LDAP search");
        let response = match self.ldap_mut() {
            Ok(ldap) => ldap
                .search(base, scope.to_ldap3(), &filter, attrs.to_vec())
                .await
                .map_err(|e| LdapError::from_ldap3("search", e)),
            Err(err) => Err(err),
        };
        let SearchResult(entries, result) = self.track(response)?;

        match result.rc {
            0 => Ok(entries
                .into_iter()
                .map(SearchEntry::construct)
                .map(LdapEntry::from_search_entry)
                .collect()),
            RC_NO_SUCH_OBJECT => Ok(Vec::new()),
            rc => Err(LdapError::operation("search", rc, result.text)),
        }
    }

    async fn add(&mut self, entry: LdapEntry) -> LdapResult<()> {
        let attrs: Vec<(String, HashSet<String>)> = entry
            .attributes
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| (name, values.into_iter().collect()))
            .collect();
        let result = match self.ldap_mut() {
            Ok(ldap) => ldap
                .add(&entry.dn, attrs)
                .await
                .and_then(ldap3::LdapResult::success)
                .map(drop)
                .map_err(|e| LdapError::from_ldap3("add", e)),
            Err(err) => Err(err),
        };
        self.track(result)
    }

    async fn modify(&mut self, dn: &str, mods: Vec<Modification>) -> LdapResult<()> {
        let mods: Vec<ldap3::Mod<String>> =
            mods.into_iter().map(Modification::into_ldap3).collect();
        let result = match self.ldap_mut() {
            Ok(ldap) => ldap
                .modify(dn, mods)
                .await
                .and_then(ldap3::LdapResult::success)
                .map(drop)
                .map_err(|e| LdapError::from_ldap3("modify", e)),
            Err(err) => Err(err),
        };
        self.track(result)
    }

    async fn modify_dn(
        &mut self,
        dn: &str,
        new_rdn: &str,
        delete_old_rdn: bool,
        new_superior: Option<&str>,
    ) -> LdapResult<()> {
        let result = match self.ldap_mut() {
            Ok(ldap) => ldap
                .modifydn(dn, new_rdn, delete_old_rdn, new_superior)
                .await
                .and_then(ldap3::LdapResult::success)
                .map(drop)
                .map_err(|e| LdapError::from_ldap3("modifyDN", e)),
            Err(err) => Err(err),
        };
        self.track(result)
    }

    /// Binds as another identity. The connection is not returned to the
    /// pool afterwards.
    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<bool> {
        self.rebound = true;
        let response = match self.ldap_mut() {
            Ok(ldap) => ldap
                .simple_bind(dn, password)
                .await
                .map_err(|e| LdapError::from_ldap3("bind", e)),
            Err(err) => Err(err),
        };
        let result = self.track(response)?;
        match result.rc {
            0 => Ok(true),
            RC_INVALID_CREDENTIALS => Ok(false),
            rc => Err(LdapError::operation("bind", rc, result.text)),
        }
    }
}
