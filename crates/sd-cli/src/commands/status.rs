//! Directory status check.

use sd_ldap::LdapConnectionPool;

use crate::output::success;

/// Checks that the directory answers and the base entry exists.
pub async fn run_status(pool: &LdapConnectionPool) -> crate::CliResult<()> {
    pool.test_connection().await?;
    let config = pool.config();
    success(&format!(
        "Connected to {} as {} (base {})",
        config.connection_url, config.bind_dn, config.base_dn
    ));
    Ok(())
}
