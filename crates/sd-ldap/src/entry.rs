//! Directory entries and mutation primitives.

use std::collections::HashMap;

use ldap3::SearchEntry;

/// Represents an LDAP entry with parsed attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished Name.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Creates an entry without attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Creates a new LDAP entry from a search result.
    #[must_use]
    pub fn from_search_entry(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
        }
    }

    /// Adds attribute values, builder style.
    #[must_use]
    pub fn with_attr<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the stored key of an attribute, matching names case-insensitively.
    #[must_use]
    pub fn attr_key(&self, name: &str) -> Option<&str> {
        self.attributes
            .keys()
            .find(|k| k.as_str() == name)
            .or_else(|| self.attributes.keys().find(|k| k.eq_ignore_ascii_case(name)))
            .map(String::as_str)
    }

    /// Gets a multi-valued attribute.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> Option<&Vec<String>> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Gets a single-valued attribute.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.get_attrs(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Checks if the entry has an attribute with at least one value.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attrs(name).is_some_and(|v| !v.is_empty())
    }

    /// Returns the object classes of the entry.
    #[must_use]
    pub fn object_classes(&self) -> &[String] {
        self.get_attrs("objectClass")
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// One attribute change within a modify operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// Adds values to an attribute.
    Add(String, Vec<String>),
    /// Removes the given values, or the whole attribute when empty.
    Delete(String, Vec<String>),
    /// Replaces all values of an attribute.
    Replace(String, Vec<String>),
}

impl Modification {
    /// Returns the affected attribute name.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add(attr, _) | Self::Delete(attr, _) | Self::Replace(attr, _) => attr,
        }
    }

    /// Converts into the ldap3 representation.
    #[must_use]
    pub fn into_ldap3(self) -> ldap3::Mod<String> {
        match self {
            Self::Add(attr, values) => ldap3::Mod::Add(attr, values.into_iter().collect()),
            Self::Delete(attr, values) => ldap3::Mod::Delete(attr, values.into_iter().collect()),
            Self::Replace(attr, values) => ldap3::Mod::Replace(attr, values.into_iter().collect()),
        }
    }
}

/// Splits a DN into its leaf RDN and the parent DN.
#[must_use]
pub fn split_dn(dn: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return (dn[..i].trim(), dn[i + 1..].trim()),
            _ => escaped = false,
        }
    }
    (dn.trim(), "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_lookup_ignores_case() {
        let entry = LdapEntry::new("uid=a,dc=example")
            .with_attr("memberUid", ["a", "b"])
            .with_attr("objectClass", ["top", "posixGroup"]);

        assert_eq!(entry.get_attrs("memberuid").map(Vec::len), Some(2));
        assert_eq!(entry.get_attr("MEMBERUID"), Some("a"));
        assert_eq!(entry.attr_key("memberuid"), Some("memberUid"));
        assert_eq!(entry.object_classes().len(), 2);
        assert!(!entry.has_attr("cn"));
    }

    #[test]
    fn split_dn_separates_leaf_from_parent() {
        assert_eq!(
            split_dn("uid=doejan,ou=users,ou=acme,dc=example"),
            ("uid=doejan", "ou=users,ou=acme,dc=example")
        );
        assert_eq!(split_dn("cn=a\\,b,dc=x"), ("cn=a\\,b", "dc=x"));
        assert_eq!(split_dn("dc=root"), ("dc=root", ""));
    }

    #[test]
    fn modification_converts_to_ldap3() {
        let m = Modification::Replace("mail".to_string(), vec!["a@b".to_string()]);
        assert_eq!(m.attribute(), "mail");
        assert!(matches!(
            m.into_ldap3(),
            ldap3::Mod::Replace(attr, values) if attr == "mail" && values.len() == 1
        ));
    }
}
