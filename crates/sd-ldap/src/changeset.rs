//! Minimal mutation sets.
//!
//! A change set compares the flat attribute maps of a stored and a desired
//! record and lists each differing attribute with its old and new values.
//! Derived attributes are never diffed; they change only through dedicated
//! operations. A move to another subtree is carried separately as a
//! [`Rename`] because it is a modify-DN, not an attribute change.

use std::collections::BTreeSet;

use crate::codec::AttributeMap;
use crate::entry::{split_dn, Modification};
use crate::mapper::attr;

/// Attributes excluded from user update diffs.
pub const USER_UPDATE_EXCLUDED: [&str; 5] = [
    attr::UID_NUMBER,
    attr::DISPLAY_NAME,
    attr::HOME_DIRECTORY,
    attr::SAMBA_SID,
    attr::MAIL,
];

/// One differing attribute. Empty value lists mean "absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    /// Attribute name.
    pub attribute: String,
    /// Stored values.
    pub old: Vec<String>,
    /// Desired values.
    pub new: Vec<String>,
}

impl AttributeChange {
    /// Returns whether the change removes the attribute.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.new.iter().all(|v| v.trim().is_empty())
    }

    /// Converts to a protocol modification: blank values delete the
    /// attribute, anything else replaces it.
    #[must_use]
    pub fn into_modification(self) -> Modification {
        if self.is_removal() {
            Modification::Delete(self.attribute, Vec::new())
        } else {
            Modification::Replace(self.attribute, self.new)
        }
    }
}

/// Move of an entry to a new DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// Resulting DN.
    pub new_dn: String,
    /// Leaf component of the new DN.
    pub new_rdn: String,
    /// Parent of the new DN.
    pub new_superior: String,
}

impl Rename {
    /// Describes a move to `new_dn`.
    #[must_use]
    pub fn to(new_dn: impl Into<String>) -> Self {
        let new_dn = new_dn.into();
        let (rdn, superior) = split_dn(&new_dn);
        Self {
            new_rdn: rdn.to_string(),
            new_superior: superior.to_string(),
            new_dn,
        }
    }
}

/// Attribute changes plus an optional move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Attribute changes, ordered by attribute name.
    pub changes: Vec<AttributeChange>,
    /// Subtree move, applied after the attribute changes.
    pub rename: Option<Rename>,
}

impl ChangeSet {
    /// Diffs two attribute maps, skipping `excluded` attributes.
    #[must_use]
    pub fn between(current: &AttributeMap, desired: &AttributeMap, excluded: &[&str]) -> Self {
        Self {
            changes: diff(current, desired, excluded),
            rename: None,
        }
    }

    /// Adds a move.
    #[must_use]
    pub fn with_rename(mut self, rename: Option<Rename>) -> Self {
        self.rename = rename;
        self
    }

    /// Replaces or inserts the change for one attribute.
    pub fn set(&mut self, change: AttributeChange) {
        self.changes.retain(|c| !c.attribute.eq_ignore_ascii_case(&change.attribute));
        self.changes.push(change);
    }

    /// Returns whether `attribute` changes.
    #[must_use]
    pub fn touches(&self, attribute: &str) -> bool {
        self.changes
            .iter()
            .any(|c| c.attribute.eq_ignore_ascii_case(attribute))
    }

    /// Returns whether nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.rename.is_none()
    }

    /// Returns the attribute modifications in order.
    #[must_use]
    pub fn modifications(&self) -> Vec<Modification> {
        self.changes
            .iter()
            .cloned()
            .map(AttributeChange::into_modification)
            .collect()
    }
}

/// Lists attributes whose values differ between `current` and `desired`.
///
/// Attributes only present in `current` are listed with empty new values.
/// The result is ordered by attribute name.
#[must_use]
pub fn diff(
    current: &AttributeMap,
    desired: &AttributeMap,
    excluded: &[&str],
) -> Vec<AttributeChange> {
    let names: BTreeSet<&String> = current.keys().chain(desired.keys()).collect();
    names
        .into_iter()
        .filter(|name| !excluded.iter().any(|e| e.eq_ignore_ascii_case(name)))
        .filter_map(|name| {
            let old = current.get(name).cloned().unwrap_or_default();
            let new = desired.get(name).cloned().unwrap_or_default();
            (old != new).then(|| AttributeChange {
                attribute: name.clone(),
                old,
                new,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), vec![(*v).to_string()]))
            .collect()
    }

    #[test]
    fn identical_maps_have_no_changes() {
        let m = map(&[("uid", "doejan"), ("title", "Engineer")]);
        assert!(diff(&m, &m, &[]).is_empty());
        assert!(ChangeSet::between(&m, &m, &USER_UPDATE_EXCLUDED).is_empty());
    }

    #[test]
    fn excluded_attributes_are_ignored() {
        let current = map(&[("mail", "a@example.org"), ("uidNumber", "1"), ("title", "A")]);
        let desired = map(&[("mail", "b@example.org"), ("uidNumber", "2"), ("title", "A")]);
        assert!(diff(&current, &desired, &USER_UPDATE_EXCLUDED).is_empty());
    }

    #[test]
    fn changed_and_removed_attributes() {
        let current = map(&[("title", "Engineer"), ("mobile", "0170")]);
        let desired = map(&[("title", "Lead"), ("l", "Hamburg")]);

        let changes = diff(&current, &desired, &[]);
        let names: Vec<_> = changes.iter().map(|c| c.attribute.as_str()).collect();
        assert_eq!(names, ["l", "mobile", "title"]);

        let mods: Vec<_> = changes.into_iter().map(AttributeChange::into_modification).collect();
        assert_eq!(mods[0], Modification::Replace("l".into(), vec!["Hamburg".into()]));
        assert_eq!(mods[1], Modification::Delete("mobile".into(), vec![]));
        assert_eq!(mods[2], Modification::Replace("title".into(), vec!["Lead".into()]));
    }

    #[test]
    fn blank_value_becomes_delete() {
        let change = AttributeChange {
            attribute: "title".into(),
            old: vec!["Engineer".into()],
            new: vec![" ".into()],
        };
        assert!(change.is_removal());
        assert_eq!(change.into_modification(), Modification::Delete("title".into(), vec![]));
    }

    #[test]
    fn set_replaces_existing_change() {
        let mut set = ChangeSet::between(
            &map(&[("employeeNumber", "1")]),
            &map(&[("employeeNumber", "")]),
            &[],
        );
        set.set(AttributeChange {
            attribute: "employeeNumber".into(),
            old: vec!["1".into()],
            new: vec!["generated".into()],
        });
        assert_eq!(set.changes.len(), 1);
        assert!(set.touches("employeenumber"));
        assert_eq!(
            set.modifications(),
            [Modification::Replace("employeeNumber".into(), vec!["generated".into()])]
        );
    }

    #[test]
    fn rename_splits_new_dn() {
        let rename = Rename::to("uid=doejan,ou=users,ou=beta,dc=example,dc=org");
        assert_eq!(rename.new_rdn, "uid=doejan");
        assert_eq!(rename.new_superior, "ou=users,ou=beta,dc=example,dc=org");

        let set = ChangeSet::default().with_rename(Some(rename));
        assert!(!set.is_empty());
        assert!(set.modifications().is_empty());
    }
}
