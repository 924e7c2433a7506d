//! Numeric user id allocation.
//!
//! The allocator remembers the last id it handed out. The first allocation
//! scans every user entry for the current maximum; later allocations probe
//! upwards from the remembered value, so ids taken by other writers are
//! still skipped. Allocations are serialized process-wide.

use tokio::sync::Mutex;

use sd_core::{AccountError, AccountResult};

use crate::config::Policy;
use crate::directory::{Directory, SearchScope};
use crate::mapper::attr;
use crate::search;

/// Error code when no free id is found within the probe budget.
pub const EXHAUSTED: &str = "uidNumber.exceeded";

/// Hands out unused `uidNumber` values.
#[derive(Debug)]
pub struct UidNumberAllocator {
    floor: u32,
    probes: u32,
    last: Mutex<Option<u32>>,
}

impl UidNumberAllocator {
    /// Creates an allocator that never returns values at or below `floor`
    /// and probes at most `probes` candidates per call.
    #[must_use]
    pub fn new(floor: u32, probes: u32) -> Self {
        Self {
            floor,
            probes,
            last: Mutex::new(None),
        }
    }

    /// Creates an allocator from the configured policy.
    #[must_use]
    pub fn from_policy(policy: &Policy) -> Self {
        Self::new(policy.uid_number_floor, policy.uid_number_probes)
    }

    /// Allocates the next unused id below `base`.
    ///
    /// # Errors
    ///
    /// Returns `AllocationExhausted` with code `uidNumber.exceeded` when
    /// every probed candidate is taken, or a protocol error from a search.
    pub async fn next(&self, conn: &mut dyn Directory, base: &str) -> AccountResult<u32> {
        let mut last = self.last.lock().await;
        let start = match *last {
            Some(value) => value,
            None => {
                let max = self.scan_max(conn, base).await?;
                tracing::debug!(max, "initialized uidNumber allocator");
                *last = Some(max);
                max
            }
        };

        let candidates = (1..=self.probes).map_while(|offset| start.checked_add(offset));
        for candidate in candidates {
            let taken = conn
                .search(
                    base,
                    SearchScope::Subtree,
                    &search::user_by_uid_number(candidate),
                    &[attr::UID_NUMBER],
                )
                .await
                .map_err(|e| e.into_account_error("general.ldap.failed"))?;
            if taken.is_empty() {
                *last = Some(candidate);
                return Ok(candidate);
            }
            tracing::debug!(candidate, "uidNumber already taken");
        }

        tracing::error!(start, probes = self.probes, "no free uidNumber found");
        Err(AccountError::exhausted(EXHAUSTED))
    }

    async fn scan_max(&self, conn: &mut dyn Directory, base: &str) -> AccountResult<u32> {
        let entries = conn
            .search(base, SearchScope::Subtree, &search::all_users(), &[attr::UID_NUMBER])
            .await
            .map_err(|e| e.into_account_error("general.ldap.failed"))?;
        Ok(entries
            .iter()
            .filter_map(|entry| crate::codec::unsigned(entry, attr::UID_NUMBER))
            .fold(self.floor, u32::max))
    }
}
