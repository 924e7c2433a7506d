//! In-process directory.
//!
//! [`MemoryDirectory`] implements the [`Directory`] port over a shared
//! in-memory tree. Clones share the tree, so each clone behaves like a
//! separate connection to the same server. Every committed write is
//! recorded in a log that tests can inspect.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::directory::{Directory, SearchScope};
use crate::entry::{split_dn, LdapEntry, Modification};
use crate::error::{LdapError, LdapResult, RC_ENTRY_ALREADY_EXISTS, RC_NO_SUCH_OBJECT};
use crate::filter::Filter;

/// A committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Entry created.
    Add {
        /// New entry DN.
        dn: String,
    },
    /// Entry modified.
    Modify {
        /// Modified entry DN.
        dn: String,
        /// Applied modifications.
        mods: Vec<Modification>,
    },
    /// Entry renamed or moved.
    ModifyDn {
        /// Previous DN.
        dn: String,
        /// Resulting DN.
        new_dn: String,
    },
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, LdapEntry>,
    writes: Vec<WriteOp>,
    searches: usize,
    failures: HashMap<&'static str, (u32, String)>,
}

/// In-memory directory for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

fn dn_key(dn: &str) -> String {
    dn.split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
        .to_lowercase()
}

fn in_scope(entry_key: &str, base_key: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => entry_key == base_key,
        SearchScope::OneLevel => split_dn(entry_key).1 == base_key,
        SearchScope::Subtree => {
            base_key.is_empty()
                || entry_key == base_key
                || entry_key.ends_with(&format!(",{base_key}"))
        }
    }
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, builder style.
    #[must_use]
    pub fn with_entry(self, entry: LdapEntry) -> Self {
        self.insert(entry);
        self
    }

    /// Stores an entry directly, bypassing the write log.
    pub fn insert(&self, entry: LdapEntry) {
        self.state.lock().entries.insert(dn_key(&entry.dn), entry);
    }

    /// Returns a copy of the entry at `dn`.
    #[must_use]
    pub fn entry(&self, dn: &str) -> Option<LdapEntry> {
        self.state.lock().entries.get(&dn_key(dn)).cloned()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the committed writes in order.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteOp> {
        self.state.lock().writes.clone()
    }

    /// Returns the number of searches served.
    #[must_use]
    pub fn search_count(&self) -> usize {
        self.state.lock().searches
    }

    /// Clears the write log and the search counter.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.searches = 0;
    }

    /// Makes every later `operation` fail with the given result code.
    pub fn fail_on(&self, operation: &'static str, code: u32, message: impl Into<String>) {
        self.state
            .lock()
            .failures
            .insert(operation, (code, message.into()));
    }

    fn check_failure(state: &State, operation: &'static str) -> LdapResult<()> {
        match state.failures.get(operation) {
            Some((code, message)) => Err(LdapError::operation(operation, *code, message.clone())),
            None => Ok(()),
        }
    }
}

fn apply(entry: &mut LdapEntry, modification: &Modification) {
    match modification {
        Modification::Add(attr, values) => {
            let key = entry.attr_key(attr).unwrap_or(attr).to_string();
            let current = entry.attributes.entry(key).or_default();
            for value in values {
                if !current.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                    current.push(value.clone());
                }
            }
        }
        Modification::Delete(attr, values) => {
            let Some(key) = entry.attr_key(attr).map(str::to_string) else {
                return;
            };
            if values.is_empty() {
                entry.attributes.remove(&key);
                return;
            }
            if let Some(current) = entry.attributes.get_mut(&key) {
                current.retain(|v| !values.iter().any(|d| d.eq_ignore_ascii_case(v)));
                if current.is_empty() {
                    entry.attributes.remove(&key);
                }
            }
        }
        Modification::Replace(attr, values) => {
            if let Some(key) = entry.attr_key(attr).map(str::to_string) {
                entry.attributes.remove(&key);
            }
            if !values.is_empty() {
                entry.attributes.insert(attr.clone(), values.clone());
            }
        }
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        _attrs: &[&str],
    ) -> LdapResult<Vec<LdapEntry>> {
        let mut state = self.state.lock();
        Self::check_failure(&state, "search")?;
        state.searches += 1;
        let base_key = dn_key(base);
        Ok(state
            .entries
            .iter()
            .filter(|(key, _)| in_scope(key, &base_key, scope))
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn add(&mut self, entry: LdapEntry) -> LdapResult<()> {
        let mut state = self.state.lock();
        Self::check_failure(&state, "add")?;
        let key = dn_key(&entry.dn);
        if state.entries.contains_key(&key) {
            return Err(LdapError::operation(
                "add",
                RC_ENTRY_ALREADY_EXISTS,
                "Entry Already Exists",
            ));
        }
        state.writes.push(WriteOp::Add {
            dn: entry.dn.clone(),
        });
        state.entries.insert(key, entry);
        Ok(())
    }

    async fn modify(&mut self, dn: &str, mods: Vec<Modification>) -> LdapResult<()> {
        let mut state = self.state.lock();
        Self::check_failure(&state, "modify")?;
        let entry = state
            .entries
            .get_mut(&dn_key(dn))
            .ok_or_else(|| LdapError::operation("modify", RC_NO_SUCH_OBJECT, "No Such Object"))?;
        for modification in &mods {
            apply(entry, modification);
        }
        state.writes.push(WriteOp::Modify {
            dn: dn.to_string(),
            mods,
        });
        Ok(())
    }

    async fn modify_dn(
        &mut self,
        dn: &str,
        new_rdn: &str,
        delete_old_rdn: bool,
        new_superior: Option<&str>,
    ) -> LdapResult<()> {
        let mut state = self.state.lock();
        Self::check_failure(&state, "modifyDN")?;
        let not_found = || LdapError::operation("modifyDN", RC_NO_SUCH_OBJECT, "No Such Object");

        let mut entry = state.entries.remove(&dn_key(dn)).ok_or_else(not_found)?;
        let (old_rdn, parent) = split_dn(&entry.dn);
        let (old_rdn, parent) = (old_rdn.to_string(), parent.to_string());
        let superior = new_superior.unwrap_or(&parent);
        let new_dn = format!("{new_rdn},{superior}");
        let new_key = dn_key(&new_dn);

        if state.entries.contains_key(&new_key) {
            let old_key = dn_key(&entry.dn);
            state.entries.insert(old_key, entry);
            return Err(LdapError::operation(
                "modifyDN",
                RC_ENTRY_ALREADY_EXISTS,
                "Entry Already Exists",
            ));
        }

        if delete_old_rdn && !old_rdn.eq_ignore_ascii_case(new_rdn) {
            if let Some((attr, value)) = old_rdn.split_once('=') {
                apply(&mut entry, &Modification::Delete(attr.to_string(), vec![value.to_string()]));
            }
        }
        if let Some((attr, value)) = new_rdn.split_once('=') {
            apply(&mut entry, &Modification::Add(attr.to_string(), vec![value.to_string()]));
        }

        entry.dn = new_dn.clone();
        state.entries.insert(new_key, entry);
        state.writes.push(WriteOp::ModifyDn {
            dn: dn.to_string(),
            new_dn,
        });
        Ok(())
    }

    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<bool> {
        let state = self.state.lock();
        Self::check_failure(&state, "bind")?;
        Ok(state
            .entries
            .get(&dn_key(dn))
            .and_then(|entry| entry.get_attr("userPassword"))
            .is_some_and(|stored| sd_auth::hash::verify(password, stored)))
    }
}
